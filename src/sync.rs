//! Multi-table step driver
//!
//! A migration is a sequence of steps. Each step streams part of one table
//! through a [`TableStreamer`] and ends with a transfer; the returned
//! [`ResumeToken`] says where the next step starts. [`Migration::run`]
//! repeats steps table by table and persists every token, so a killed run
//! picks up at the first unfinished table.
//!
//! # Sinks
//!
//! The sink follows from the intent and stage:
//!
//! - dumps and backups append to a local file, gzip-compressed when the name
//!   ends with `.gz`
//! - pulls keep each chunk in memory and return it in the step body
//! - the find_replace stage executes the UPDATE statements locally
//! - everything else is posted to the remote chunk endpoint

use anyhow::Context;
use checkpoint::{Checkpoint, CheckpointManager};
use chunk_sink::{ChunkSink, MemorySink};
use std::path::PathBuf;
use std::sync::Arc;
use sync_core::{MigrationContext, Stage};
use tracing::{debug, info};
use wp_db_sync_file::{dump_file_name, session_salt, SinkOptions, SinkTarget};
use wp_db_sync_mysql_source::{
    backup_header, get_tables, process_chunk, DbAccessor, DumpLocation, ExecuteSink,
    MigrationCache, ResumeToken, SinkKind, StepOutcome, TableStep, TableStreamer,
};

/// Runs exactly one step of one table.
pub async fn run_step(
    context: &MigrationContext,
    cache: &mut MigrationCache,
    db: &dyn DbAccessor,
    sink: &mut dyn ChunkSink,
    step: &TableStep,
) -> StepOutcome {
    TableStreamer::new(context, db, sink, cache).run(step).await
}

/// What a finished migration did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub tables: usize,
    pub steps: usize,
    /// Set after a savefile export.
    pub dump: Option<DumpLocation>,
}

/// One migration over one database.
pub struct Migration {
    context: MigrationContext,
    db: Arc<dyn DbAccessor>,
    tables: Vec<String>,
    output: Option<SinkTarget>,
    sink_options: SinkOptions,
    checkpoints: CheckpointManager,
}

impl Migration {
    pub fn new(context: MigrationContext, db: Arc<dyn DbAccessor>) -> Self {
        Self {
            context,
            db,
            tables: Vec::new(),
            output: None,
            sink_options: SinkOptions::default(),
            checkpoints: CheckpointManager::disabled(),
        }
    }

    /// Tables to stream, in order. Without any, every table carrying the
    /// table prefix is streamed.
    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_output(mut self, output: SinkTarget) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_sink_options(mut self, sink_options: SinkOptions) -> Self {
        self.sink_options = sink_options;
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: CheckpointManager) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    pub fn context(&self) -> &MigrationContext {
        &self.context
    }

    async fn resolve_tables(&self) -> anyhow::Result<Vec<String>> {
        if !self.tables.is_empty() {
            return Ok(self.tables.clone());
        }
        let prefix = &self.context.options.table_prefix;
        Ok(get_tables(self.db.as_ref(), &self.context, Some(prefix)).await?)
    }

    /// Where a dump goes: the configured path, or a generated name in the
    /// working directory.
    fn dump_location(&self, append: bool) -> anyhow::Result<(SinkTarget, DumpLocation)> {
        let target = match &self.output {
            Some(SinkTarget::Http(url)) => {
                anyhow::bail!("A {} migration writes a dump file, not to {url}", self.context.intent)
            }
            Some(target) => target.clone(),
            None if append => {
                anyhow::bail!("Resuming a dump needs the output path of the interrupted run")
            }
            None => {
                let migration_type = if self.context.stage == Stage::Backup {
                    "backup"
                } else {
                    "migrate"
                };
                let name = dump_file_name(
                    self.db.database_name(),
                    migration_type,
                    chrono::Local::now(),
                    &session_salt(),
                    self.context.options.gzip_file,
                );
                SinkTarget::Local(PathBuf::from(name))
            }
        };
        let SinkTarget::Local(path) = &target else {
            anyhow::bail!("Dump target must be a local path");
        };
        let dump = DumpLocation {
            dump_filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            dump_path: path.display().to_string(),
        };
        Ok((target, dump))
    }

    /// Opens the sink for `kind`. `append` continues an interrupted dump.
    pub async fn open_sink(
        &self,
        kind: SinkKind,
        append: bool,
    ) -> anyhow::Result<(Box<dyn ChunkSink>, Option<DumpLocation>)> {
        match kind {
            SinkKind::File => {
                let (target, dump) = self.dump_location(append)?;
                let options = SinkOptions {
                    append,
                    ..self.sink_options.clone()
                };
                info!("Writing dump to {}", target.display_name());
                Ok((target.open(&options).await?, Some(dump)))
            }
            SinkKind::Response => Ok((Box::new(MemorySink::new()), None)),
            SinkKind::Execute => Ok((
                Box::new(ExecuteSink::new(
                    self.db.clone(),
                    self.context.options.clone(),
                )),
                None,
            )),
            SinkKind::Remote => match &self.output {
                Some(target @ SinkTarget::Http(_)) => {
                    info!("Sending chunks to {}", target.display_name());
                    Ok((target.open(&self.sink_options).await?, None))
                }
                _ => anyhow::bail!(
                    "A {} migration needs the remote endpoint URL as output",
                    self.context.intent
                ),
            },
        }
    }

    /// The first table holding a stored token, with that token.
    async fn resume_point(&self, tables: &[String]) -> anyhow::Result<Option<(usize, ResumeToken)>> {
        for (index, table) in tables.iter().enumerate() {
            if let Some(token) = self.checkpoints.load::<ResumeToken>(table).await? {
                return Ok(Some((index, token)));
            }
        }
        Ok(None)
    }

    /// Creates the alter table and writes the dump banner.
    async fn begin(
        &self,
        kind: SinkKind,
        cache: &mut MigrationCache,
        sink: &mut dyn ChunkSink,
        tables: &[String],
    ) -> anyhow::Result<()> {
        if matches!(kind, SinkKind::File | SinkKind::Execute) {
            let create = cache.create_alter_table_query(&self.context);
            process_chunk(self.db.as_ref(), &self.context.options, create.as_bytes())
                .await
                .context("Failed to create the alter statements table")?;
        }
        if kind == SinkKind::File && self.context.is_backup() {
            let header = backup_header(
                &self.context,
                self.db.as_ref(),
                cache,
                tables,
                chrono::Utc::now(),
            )
            .await?;
            sink.write_chunk(header.as_bytes()).await?;
        }
        Ok(())
    }

    /// Streams every table, calling `on_step` after each step.
    ///
    /// A step that ends in an error stops the migration; its token stays
    /// stored, so the next run repeats that step.
    pub async fn run(
        &self,
        mut on_step: impl FnMut(&str, &StepOutcome),
    ) -> anyhow::Result<MigrationSummary> {
        let tables = self.resolve_tables().await?;
        if tables.is_empty() {
            anyhow::bail!("No tables to migrate");
        }

        let resume_point = self.resume_point(&tables).await?;
        let append = resume_point.is_some();
        let (start, mut resume) = resume_point.unwrap_or_default();

        let kind = SinkKind::for_context(&self.context);
        let (mut sink, dump) = self.open_sink(kind, append).await?;
        let mut cache = MigrationCache::new();

        if append {
            info!(
                "Resuming at table {} from {}",
                tables[start],
                resume.to_cli_string()
            );
        } else {
            info!(
                "Migrating {} tables ({}, stage {})",
                tables.len(),
                self.context.intent,
                self.context.stage
            );
            self.begin(kind, &mut cache, sink.as_mut(), &tables).await?;
        }

        let mut summary = MigrationSummary::default();
        for (index, table) in tables.iter().enumerate().skip(start) {
            let last_table = index + 1 == tables.len();
            loop {
                let mut step = TableStep::new(table.as_str())
                    .last(last_table)
                    .resume_from(resume.clone());
                if let Some(dump) = &dump {
                    step = step.with_dump(dump.clone());
                }

                let outcome =
                    run_step(&self.context, &mut cache, self.db.as_ref(), sink.as_mut(), &step)
                        .await;
                summary.steps += 1;
                on_step(table, &outcome);

                let token = match &outcome {
                    StepOutcome::Error { message } => {
                        anyhow::bail!("Migration of table {table} failed: {message}")
                    }
                    StepOutcome::Progress {
                        token,
                        dump: Some(dump),
                    } => {
                        summary.dump = Some(dump.clone());
                        token.clone()
                    }
                    StepOutcome::Progress { token, .. } | StepOutcome::Pull { token, .. } => {
                        token.clone()
                    }
                };

                if token.is_finished() {
                    // Hand over to the next table before forgetting this one.
                    if let Some(next) = tables.get(index + 1) {
                        self.checkpoints.save(next, &ResumeToken::default()).await?;
                    }
                    self.checkpoints.clear::<ResumeToken>(table).await?;
                    break;
                }
                debug!("Table {table} continues at {}", token.to_cli_string());
                self.checkpoints.save(table, &token).await?;
                resume = token;
            }
            resume = ResumeToken::default();
            summary.tables += 1;
        }

        info!(
            "Migration finished: {} tables in {} steps",
            summary.tables, summary.steps
        );
        Ok(summary)
    }
}
