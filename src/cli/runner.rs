//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{LoggingConfig, PipelineConfig};
use crate::database::{self, MysqlConnectionInfo, MysqlSource, SshTunnel};
use crate::error::{Error, Result};
use crate::partition::generate_periods;
use crate::pipeline::{build_tasks, Orchestrator};
use crate::types::SourceKind;
use serde_json::{json, Value};
use tracing::{debug, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command, returning the process exit code
    pub async fn run(&self) -> Result<u8> {
        match &self.cli.command {
            Commands::Run { only } => self.run_pipeline(*only).await,
            Commands::Plan => self.plan().map(|()| 0),
            Commands::Periods { start, end } => self.periods(start, end).map(|()| 0),
            Commands::Tables => self.tables().await.map(|()| 0),
            Commands::Validate => self.validate().map(|()| 0),
        }
    }

    /// Logging settings: the configuration file's, adjusted by CLI flags
    ///
    /// Falls back to defaults when the file cannot be loaded; the command
    /// itself reports that error once logging is up.
    pub fn logging_config(&self) -> LoggingConfig {
        let mut logging = PipelineConfig::from_file(&self.cli.config)
            .map(|config| config.logging)
            .unwrap_or_default();
        if self.cli.verbose {
            logging.level = "debug".to_string();
        }
        if let Some(format) = self.cli.log_format {
            logging.format = format;
        }
        logging
    }

    /// Load and validate the pipeline configuration
    fn load_config(&self) -> Result<PipelineConfig> {
        debug!(path = %self.cli.config.display(), "Loading configuration");
        let config = PipelineConfig::from_file(&self.cli.config)?;
        config.validate()?;
        Ok(config)
    }

    async fn run_pipeline(&self, only: Option<SourceKind>) -> Result<u8> {
        let config = self.load_config()?;
        info!(config = %self.cli.config.display(), only = ?only, "Starting pipeline");

        let summary = Orchestrator::new(config).only(only).run().await;

        self.output_message(&json!({
            "type": "SUMMARY",
            "summary": summary,
            "failures": summary.total_failures(),
        }));

        Ok(if summary.exit_code() == 0 { 0 } else { 1 })
    }

    fn plan(&self) -> Result<()> {
        let config = self.load_config()?;
        let api = config
            .api
            .as_ref()
            .ok_or_else(|| Error::missing_field("api"))?;

        for task in build_tasks(api)? {
            self.output_message(&json!({ "type": "TASK", "task": task }));
        }
        Ok(())
    }

    fn periods(&self, start: &str, end: &str) -> Result<()> {
        for period in generate_periods(start, end)? {
            self.output_message(&json!({ "type": "PERIOD", "period": period }));
        }
        Ok(())
    }

    async fn tables(&self) -> Result<()> {
        let config = self.load_config()?;
        let db = config
            .database
            .as_ref()
            .ok_or_else(|| Error::missing_field("database"))?;

        let source = MysqlSource::new(MysqlConnectionInfo::through_tunnel(
            &db.mysql,
            db.ssh.local_port,
        ));
        let tables = database::list_tables(SshTunnel::new(db.ssh.clone()), &source).await?;

        for table in &tables {
            self.output_message(&json!({ "type": "TABLE", "name": table }));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let config = self.load_config()?;

        let tasks = match &config.api {
            Some(api) => build_tasks(api)?.len(),
            None => 0,
        };

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!(
                    "Configuration '{}' is valid: api={}, database={}, {} API tasks",
                    self.cli.config.display(),
                    config.api.is_some(),
                    config.database.is_some(),
                    tasks
                )
            }
        }));
        Ok(())
    }

    /// Output a message in the selected format
    fn output_message(&self, msg: &Value) {
        let line = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(msg),
            OutputFormat::Pretty => serde_json::to_string_pretty(msg),
        };
        println!("{}", line.unwrap_or_default());
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner").field("cli", &self.cli).finish()
    }
}
