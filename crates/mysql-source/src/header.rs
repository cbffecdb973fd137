//! Table header and footer SQL, and the deferred ALTER statements.

use mysql_types::ddl::{alter_statement_insert, copy_table, normalize_create_table, split_constraints};
use mysql_types::SchemaError;
use sync_core::backquote;
use tracing::debug;

use crate::accessor::DbAccessor;
use crate::cache::MigrationCache;
use crate::error::MigrateError;
use crate::execute::process_chunk;
use crate::streamer::{TableNames, TableStreamer};

const SEPARATOR: &str = "# --------------------------------------------------------\n";

/// The deferred statements collected in the alter table, one per line.
pub async fn alter_queries(
    db: &dyn DbAccessor,
    alter_table: &str,
) -> Result<String, MigrateError> {
    if !db.exists(alter_table).await? {
        return Ok(String::new());
    }
    let rows = db
        .query(&format!("SELECT * FROM {}", backquote(alter_table)))
        .await?;
    let mut sql = String::new();
    for query in rows.iter().filter_map(|row| row.text("query")) {
        sql.push_str(&query);
        sql.push('\n');
    }
    Ok(sql)
}

impl TableStreamer<'_> {
    /// DROP and CREATE for the destination table, with comments in dumps.
    ///
    /// Constraints are split off the CREATE statement and recorded in the
    /// alter table; in a backup that record is made right away, otherwise it
    /// travels with the chunk.
    pub(crate) async fn build_table_header(&mut self, names: &TableNames) -> Result<(), MigrateError> {
        let context = self.context;
        let is_backup = context.is_backup();
        let table_to_stow = names.destination(context).to_string();
        let quoted = backquote(&table_to_stow);

        let mut stow = String::new();
        if is_backup {
            stow.push_str(&format!("\n\n#\n# Delete any existing table {quoted}\n#\n\n"));
        }
        stow.push_str(&format!("DROP TABLE IF EXISTS {quoted};\n"));
        if is_backup {
            stow.push_str(&format!("\n\n#\n# Table structure of table {quoted}\n#\n\n"));
        }

        let create = self
            .db
            .show_create_table(&names.source)
            .await?
            .ok_or_else(|| SchemaError::CreateTableUnavailable {
                table: names.source.clone(),
            })?;
        let create = normalize_create_table(&create, &names.source, &table_to_stow);
        let (create, alter) = split_constraints(&create, &names.target);
        let create = match &context.hooks.create_table_query {
            Some(hook) => hook(create, &table_to_stow),
            None => create,
        };
        stow.push_str(&create);
        stow.push_str(";\n");
        self.buffer.stow_raw(stow.as_bytes());

        let alter_table = MigrationCache::alter_table_name(context);
        if let Some(alter) = alter {
            debug!("Deferring constraints of {}", names.source);
            self.record_alter(&alter_statement_insert(&alter_table, &alter))
                .await?;
        }

        let alter_data_queries = context
            .hooks
            .alter_data_queries
            .as_ref()
            .map(|hook| hook(&table_to_stow))
            .unwrap_or_default();
        if !alter_data_queries.is_empty() {
            let inserts: String = alter_data_queries
                .iter()
                .map(|query| alter_statement_insert(&alter_table, query))
                .collect();
            self.record_alter(&inserts).await?;
        }

        if is_backup {
            self.buffer
                .stow_raw(format!("\n\n#\n# Data contents of table {quoted}\n#\n").as_bytes());
        }
        Ok(())
    }

    async fn record_alter(&mut self, inserts: &str) -> Result<(), MigrateError> {
        if self.context.is_backup() {
            process_chunk(self.db, &self.context.options, inserts.as_bytes()).await
        } else {
            self.buffer.stow_raw(inserts.as_bytes());
            Ok(())
        }
    }

    /// Copies `table` to its staging name for an in-place find and replace.
    pub(crate) async fn create_temp_table(&mut self, table: &str) -> Result<(), MigrateError> {
        if !self.db.exists(table).await? {
            return Err(SchemaError::TableMissing {
                table: table.to_string(),
            }
            .into());
        }
        let temp = self.context.temp_name(table);
        debug!("Copying {table} to {temp}");
        process_chunk(
            self.db,
            &self.context.options,
            copy_table(table, &temp).as_bytes(),
        )
        .await
    }

    /// End-of-table comment. After the last table the deferred statements
    /// are appended and the alter table is dropped, then recreated for the
    /// next backup.
    pub(crate) async fn build_table_footer(
        &mut self,
        names: &TableNames,
        last_table: bool,
    ) -> Result<(), MigrateError> {
        let context = self.context;
        self.buffer.stow_raw(
            format!(
                "\n#\n# End of data contents of table {}\n{SEPARATOR}\n",
                backquote(&names.target)
            )
            .as_bytes(),
        );

        if !last_table {
            return Ok(());
        }

        let alter_table = MigrationCache::alter_table_name(context);
        let mut stow = String::from("#\n# Add constraints back in and apply any alter data queries.\n#\n\n");
        stow.push_str(&alter_queries(self.db, &alter_table).await?);
        self.buffer.stow_raw(stow.as_bytes());

        self.db
            .execute(format!("DROP TABLE IF EXISTS {};", backquote(&alter_table)).as_bytes())
            .await?;

        if context.stage == sync_core::Stage::Backup {
            let create = self.cache.create_alter_table_query(context);
            process_chunk(self.db, &context.options, create.as_bytes()).await?;
        }
        Ok(())
    }
}
