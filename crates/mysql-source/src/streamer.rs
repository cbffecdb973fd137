//! One step of one table: read pages, encode rows, hand SQL to the sink.
//!
//! A step runs until the table is exhausted or the chunk is full. Either way
//! it ends with a transfer and returns the token the next step resumes from.

use chunk_sink::{ChunkSink, Transfer};
use mysql_types::{SchemaError, TableStructure};
use serde_json::json;
use sync_core::{backquote, Intent, MigrationContext, Stage};
use tracing::{debug, info, warn};

use crate::accessor::DbAccessor;
use crate::buffer::{Admit, ChunkBuffer};
use crate::cache::MigrationCache;
use crate::cursor::PageCursor;
use crate::encoder::RowEncoder;
use crate::error::MigrateError;
use crate::keys::PrimaryKeyState;
use crate::token::ResumeToken;
use checkpoint::Checkpoint;

/// Where a finished dump was written, reported after its last table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpLocation {
    pub dump_filename: String,
    pub dump_path: String,
}

/// What the caller asks of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStep {
    pub table: String,
    /// The last table of the migration gets the deferred ALTER statements.
    pub last_table: bool,
    pub resume: ResumeToken,
    pub dump: Option<DumpLocation>,
}

impl TableStep {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            last_table: false,
            resume: ResumeToken::default(),
            dump: None,
        }
    }

    pub fn last(mut self, last_table: bool) -> Self {
        self.last_table = last_table;
        self
    }

    pub fn resume_from(mut self, resume: ResumeToken) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_dump(mut self, dump: DumpLocation) -> Self {
        self.dump = Some(dump);
        self
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step completed; `token` says where the next one starts. Carries
    /// the dump location after the last table of a savefile export.
    Progress {
        token: ResumeToken,
        dump: Option<DumpLocation>,
    },
    /// A pull answers with the SQL itself followed by `row,keys`.
    Pull { chunk: Vec<u8>, token: ResumeToken },
    /// A fatal error, reported instead of propagated.
    Error { message: String },
}

impl StepOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn token(&self) -> Option<&ResumeToken> {
        match self {
            Self::Progress { token, .. } | Self::Pull { token, .. } => Some(token),
            Self::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The response body.
    ///
    /// Progress is `{"current_row": n, "primary_keys": "..."}` plus
    /// `dump_filename`/`dump_path` when set, an error is
    /// `{"error": true, "message": "..."}`, and a pull is the chunk followed
    /// by the token's `row,keys` form.
    pub fn body(&self) -> Vec<u8> {
        let value = match self {
            Self::Pull { chunk, token } => {
                let mut body = chunk.clone();
                body.extend_from_slice(token.to_cli_string().as_bytes());
                return body;
            }
            Self::Progress { token, dump } => {
                let mut value = json!({
                    "current_row": token.current_row,
                    "primary_keys": token.primary_keys,
                });
                if let (Some(dump), Some(map)) = (dump, value.as_object_mut()) {
                    map.insert("dump_filename".into(), json!(dump.dump_filename));
                    map.insert("dump_path".into(), json!(dump.dump_path));
                }
                value
            }
            Self::Error { message } => json!({ "error": true, "message": message }),
        };
        value.to_string().into_bytes()
    }
}

impl From<MigrateError> for StepOutcome {
    fn from(err: MigrateError) -> Self {
        StepOutcome::error(err.to_string())
    }
}

/// Which kind of sink a migration writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// A local dump file.
    File,
    /// Kept in memory and returned in the step response.
    Response,
    /// Executed against the local database.
    Execute,
    /// Posted to the remote site.
    Remote,
}

impl SinkKind {
    pub fn for_context(context: &MigrationContext) -> Self {
        match (context.intent, context.stage) {
            (Intent::Savefile, _) | (_, Stage::Backup) | (_, Stage::Import) => SinkKind::File,
            (Intent::Pull, _) => SinkKind::Response,
            (_, Stage::FindReplace) => SinkKind::Execute,
            _ => SinkKind::Remote,
        }
    }
}

/// Resolved names of the table being streamed.
#[derive(Debug, Clone)]
pub(crate) struct TableNames {
    pub source: String,
    pub target: String,
    pub temp: String,
}

impl TableNames {
    fn resolve(context: &MigrationContext, table: &str) -> Self {
        let target = context
            .hooks
            .target_table(table, context.intent, context.stage);
        let temp = match context.intent {
            Intent::Import => target.clone(),
            _ => context.temp_name(&target),
        };
        Self {
            source: table.to_string(),
            target,
            temp,
        }
    }

    /// The table rows are written to: the real name in dumps and backups,
    /// the staging copy otherwise.
    pub fn destination(&self, context: &MigrationContext) -> &str {
        if context.is_backup() {
            &self.target
        } else {
            &self.temp
        }
    }
}

/// Streams tables for one migration.
pub struct TableStreamer<'a> {
    pub(crate) context: &'a MigrationContext,
    pub(crate) db: &'a dyn DbAccessor,
    sink: &'a mut dyn ChunkSink,
    pub(crate) cache: &'a mut MigrationCache,
    pub(crate) buffer: ChunkBuffer,
}

impl<'a> TableStreamer<'a> {
    pub fn new(
        context: &'a MigrationContext,
        db: &'a dyn DbAccessor,
        sink: &'a mut dyn ChunkSink,
        cache: &'a mut MigrationCache,
    ) -> Self {
        let buffer = ChunkBuffer::new(
            context.options.maximum_chunk_size,
            context.options.max_insert_string_len,
        );
        Self {
            context,
            db,
            sink,
            cache,
            buffer,
        }
    }

    /// Runs one step, rendering fatal errors as an error outcome.
    pub async fn run(&mut self, step: &TableStep) -> StepOutcome {
        match self.process_table(step).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("Step for table {} failed: {err}", step.table);
                err.into()
            }
        }
    }

    /// Runs one step of `step.table`.
    pub async fn process_table(&mut self, step: &TableStep) -> Result<StepOutcome, MigrateError> {
        let context = self.context;
        let names = TableNames::resolve(context, &step.table);

        let columns = self.db.describe(&names.source).await?;
        if columns.is_empty() {
            return Err(SchemaError::StructureUnavailable {
                table: names.source.clone(),
            }
            .into());
        }
        let structure = TableStructure::inspect(&columns, &context.hooks);
        let mut keys =
            PrimaryKeyState::from_structure(&structure).resume(&step.resume.primary_keys);
        let key_columns: Vec<String> = keys.columns().map(str::to_string).collect();

        let mut row_start = step.resume.row_start();
        let mut row_tracker = row_start as i64;
        if row_tracker == 0 {
            info!("Starting table {}", names.source);
            self.pre_process(&names).await?;
        }

        let cursor = PageCursor::new(context, &names.source);
        let template = self.insert_template(&names, &structure);
        loop {
            let select = cursor.next_page(row_start, &structure, &mut keys);
            let rows = self.db.query(&select).await?;
            debug!("Fetched {} rows from {}", rows.len(), names.source);

            let mut encoder = RowEncoder::new(context, &structure, &names.source, &names.temp);
            self.buffer.start(template.clone());
            for row in &rows {
                let encoded = encoder.encode(row, key_columns.iter().map(String::as_str));
                match self.buffer.admit(&encoded.sql) {
                    Admit::Accepted => {
                        row_tracker += 1;
                        keys.track(row);
                    }
                    Admit::Transfer { accepted } => {
                        if accepted {
                            row_tracker += 1;
                            keys.track(row);
                        }
                        let token = ResumeToken::new(row_tracker, keys.serialize());
                        return self.transfer_chunk(step, token).await;
                    }
                }
            }

            self.buffer.stow();
            self.write_ready().await?;
            if rows.is_empty() {
                break;
            }
            row_start += context.options.rows_per_segment as u64;
        }

        self.post_process(&names, step).await?;
        info!("Finished table {}", names.source);
        self.transfer_chunk(step, ResumeToken::new(-1, keys.serialize()))
            .await
    }

    /// `INSERT INTO <destination> ( cols ) VALUES\n`, or nothing in the
    /// find_replace stage where rows become UPDATE statements.
    fn insert_template(&self, names: &TableNames, structure: &TableStructure) -> String {
        if self.context.stage == Stage::FindReplace {
            return String::new();
        }
        format!(
            "INSERT INTO {} ( {} ) VALUES\n",
            backquote(names.destination(self.context)),
            structure.column_list()
        )
    }

    async fn pre_process(&mut self, names: &TableNames) -> Result<(), MigrateError> {
        let context = self.context;
        match context.intent {
            Intent::FindReplace | Intent::Import => {
                if context.stage == Stage::Backup {
                    self.build_table_header(names).await?;
                } else if context.intent == Intent::FindReplace {
                    self.create_temp_table(&names.source).await?;
                }
            }
            _ => self.build_table_header(names).await?,
        }
        Ok(())
    }

    async fn post_process(&mut self, names: &TableNames, step: &TableStep) -> Result<(), MigrateError> {
        if self.context.is_backup() {
            self.build_table_footer(names, step.last_table).await?;
        }
        Ok(())
    }

    /// Moves stowed SQL to the sink.
    pub(crate) async fn write_ready(&mut self) -> Result<(), MigrateError> {
        let ready = self.buffer.take_ready();
        if !ready.is_empty() {
            self.sink.write_chunk(&ready).await?;
        }
        Ok(())
    }

    async fn transfer_chunk(
        &mut self,
        step: &TableStep,
        token: ResumeToken,
    ) -> Result<StepOutcome, MigrateError> {
        let context = self.context;
        self.write_ready().await?;
        debug!(
            "Transferring {} bytes for {} at row {}",
            self.buffer.chunk_len(),
            step.table,
            token.current_row
        );
        self.sink.transfer(&Transfer::new(&step.table)).await?;

        let outcome = match context.intent {
            Intent::Savefile | Intent::FindReplace | Intent::Import => StepOutcome::Progress {
                dump: step
                    .dump
                    .clone()
                    .filter(|_| context.intent == Intent::Savefile && step.last_table),
                token,
            },
            _ if context.stage == Stage::Backup => StepOutcome::Progress { token, dump: None },
            Intent::Pull => StepOutcome::Pull {
                chunk: self.sink.take_response().unwrap_or_default(),
                token,
            },
            Intent::Push | Intent::Export => StepOutcome::Progress { token, dump: None },
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDb;
    use chunk_sink::MemorySink;
    use mysql_types::ColumnDescriptor;
    use sync_core::Row;

    const CREATE_POSTS: &str = "CREATE TABLE `wp_posts` (\n  `ID` bigint(20) unsigned NOT NULL AUTO_INCREMENT,\n  `post_content` longtext NOT NULL,\n  PRIMARY KEY (`ID`)\n) ENGINE=InnoDB";

    fn posts_db() -> FakeDb {
        let db = FakeDb::new();
        db.add_table(
            "wp_posts",
            vec![
                ColumnDescriptor::new("ID", "bigint(20) unsigned", "PRI", None),
                ColumnDescriptor::new("post_content", "longtext", "", None),
            ],
            CREATE_POSTS,
        );
        db
    }

    fn post(id: u32, content: &str) -> Row {
        Row::new()
            .with("ID", Some(&id.to_string()))
            .with("post_content", Some(content))
    }

    #[test]
    fn test_sink_kind() {
        let kind = |intent, stage| SinkKind::for_context(&MigrationContext::new(intent, stage));
        assert_eq!(kind(Intent::Savefile, Stage::Migrate), SinkKind::File);
        assert_eq!(kind(Intent::Push, Stage::Backup), SinkKind::File);
        assert_eq!(kind(Intent::Pull, Stage::Migrate), SinkKind::Response);
        assert_eq!(kind(Intent::FindReplace, Stage::FindReplace), SinkKind::Execute);
        assert_eq!(kind(Intent::Push, Stage::Migrate), SinkKind::Remote);
    }

    #[test]
    fn test_outcome_json() {
        let outcome = StepOutcome::Progress {
            token: ResumeToken::new(-1, "a:0:{}"),
            dump: Some(DumpLocation {
                dump_filename: "wp-backup.sql".into(),
                dump_path: "/tmp/wp-backup.sql".into(),
            }),
        };
        assert_eq!(
            String::from_utf8(outcome.body()).unwrap(),
            r#"{"current_row":-1,"primary_keys":"a:0:{}","dump_filename":"wp-backup.sql","dump_path":"/tmp/wp-backup.sql"}"#
        );

        let outcome: StepOutcome = MigrateError::sql_execution("boom").into();
        assert_eq!(
            String::from_utf8(outcome.body()).unwrap(),
            r#"{"error":true,"message":"boom"}"#
        );

        let outcome = StepOutcome::Pull {
            chunk: b"INSERT ... ;\n".to_vec(),
            token: ResumeToken::new(2, "a:1:{s:2:\"ID\";s:1:\"2\";}"),
        };
        assert_eq!(
            String::from_utf8(outcome.body()).unwrap(),
            "INSERT ... ;\n2,a:1:{s:2:\"ID\";s:1:\"2\";}"
        );
    }

    #[tokio::test]
    async fn test_push_streams_into_temp_table() {
        let db = posts_db();
        db.queue_page("wp_posts", vec![post(1, "http://old.com"), post(2, "plain")]);
        let context = MigrationContext::new(Intent::Push, Stage::Migrate)
            .with_pairs([("http://old.com", "http://new.com")]);
        let mut sink = MemorySink::new();
        let mut cache = MigrationCache::new();

        let outcome = TableStreamer::new(&context, &db, &mut sink, &mut cache)
            .process_table(&TableStep::new("wp_posts"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            StepOutcome::Progress {
                token: ResumeToken::new(-1, r#"a:1:{s:2:"ID";s:1:"2";}"#),
                dump: None
            }
        );
        let sql = sink.text();
        assert!(sql.starts_with("DROP TABLE IF EXISTS `_mig_wp_posts`;\nCREATE TABLE `_mig_wp_posts` ("));
        assert!(sql.ends_with(
            "INSERT INTO `_mig_wp_posts` ( `ID`, `post_content` ) VALUES\n(1, 'http://new.com'),\n(2, 'plain') ;\n"
        ));
        assert_eq!(sink.transfers().len(), 1);

        let selects = db.selects("wp_posts");
        assert_eq!(selects.len(), 2);
        assert!(selects[1].contains("WHERE 1=1 AND ( ( `ID` > '2' ) )"));
    }

    #[tokio::test]
    async fn test_full_chunk_resumes_after_last_row() {
        let db = posts_db();
        db.queue_page(
            "wp_posts",
            vec![post(1, &"a".repeat(40)), post(2, &"b".repeat(40)), post(3, "c")],
        );
        let mut context = MigrationContext::new(Intent::Push, Stage::Migrate);
        let template_len = "INSERT INTO `_mig_wp_posts` ( `ID`, `post_content` ) VALUES\n".len();
        let header_len = "DROP TABLE IF EXISTS `_mig_wp_posts`;\n".len()
            + CREATE_POSTS.replace("`wp_posts`", "`_mig_wp_posts`").len()
            + 2;
        context.options.maximum_chunk_size = header_len + template_len + 30 + 60;
        let mut sink = MemorySink::new();
        let mut cache = MigrationCache::new();

        let outcome = TableStreamer::new(&context, &db, &mut sink, &mut cache)
            .process_table(&TableStep::new("wp_posts"))
            .await
            .unwrap();
        let token = outcome.token().cloned().unwrap();
        assert_eq!(token, ResumeToken::new(1, r#"a:1:{s:2:"ID";s:1:"1";}"#));
        assert!(sink.text().contains(&format!("(1, '{}') ;\n", "a".repeat(40))));
        assert!(!sink.text().contains("bbbb"));

        // The next step continues after ID 1 and skips the header.
        db.queue_page("wp_posts", vec![post(2, "b"), post(3, "c")]);
        let mut sink = MemorySink::new();
        let outcome = TableStreamer::new(&context, &db, &mut sink, &mut cache)
            .process_table(&TableStep::new("wp_posts").resume_from(token))
            .await
            .unwrap();
        assert!(outcome.token().unwrap().is_finished());
        assert!(sink.text().starts_with("INSERT INTO `_mig_wp_posts`"));
        assert!(db.selects("wp_posts")[1].contains("( `ID` > '1' )"));
    }

    #[tokio::test]
    async fn test_missing_structure_is_an_error_outcome() {
        let db = FakeDb::new();
        let context = MigrationContext::new(Intent::Push, Stage::Migrate);
        let mut sink = MemorySink::new();
        let mut cache = MigrationCache::new();

        let outcome = TableStreamer::new(&context, &db, &mut sink, &mut cache)
            .run(&TableStep::new("wp_gone"))
            .await;
        assert_eq!(
            outcome,
            StepOutcome::error(
                "Failed to retrieve table structure for table 'wp_gone', please ensure your database is online."
            )
        );
    }

    #[tokio::test]
    async fn test_pull_returns_chunk() {
        let db = posts_db();
        db.queue_page("wp_posts", vec![post(7, "x")]);
        let context = MigrationContext::new(Intent::Pull, Stage::Migrate);
        let mut sink = MemorySink::new();
        let mut cache = MigrationCache::new();

        let outcome = TableStreamer::new(&context, &db, &mut sink, &mut cache)
            .process_table(&TableStep::new("wp_posts"))
            .await
            .unwrap();
        let body = String::from_utf8(outcome.body()).unwrap();
        assert!(body.starts_with("DROP TABLE IF EXISTS `_mig_wp_posts`;\n"));
        assert!(body.ends_with("(7, 'x') ;\n-1,a:1:{s:2:\"ID\";s:1:\"7\";}"));
    }

    #[tokio::test]
    async fn test_offset_paging_without_integer_key() {
        let db = FakeDb::new();
        db.add_table(
            "wp_links",
            vec![
                ColumnDescriptor::new("slug", "varchar(20)", "PRI", None),
                ColumnDescriptor::new("url", "text", "", None),
            ],
            "CREATE TABLE `wp_links` (\n  `slug` varchar(20) NOT NULL\n)",
        );
        db.queue_page("wp_links", vec![Row::new().with("slug", Some("a")).with("url", Some("u"))]);
        let mut context = MigrationContext::new(Intent::Push, Stage::Migrate);
        context.options.rows_per_segment = 1;
        let mut sink = MemorySink::new();
        let mut cache = MigrationCache::new();

        let outcome = TableStreamer::new(&context, &db, &mut sink, &mut cache)
            .process_table(&TableStep::new("wp_links"))
            .await
            .unwrap();
        assert_eq!(outcome.token(), Some(&ResumeToken::new(-1, "a:0:{}")));
        let selects = db.selects("wp_links");
        assert!(selects[0].ends_with("LIMIT 0, 1"));
        assert!(selects[1].ends_with("LIMIT 1, 1"));
    }
}
