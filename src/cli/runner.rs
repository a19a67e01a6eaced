//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, FetchArgs, SchemaCommand, SchemaFormat};
use crate::config::RunConfig;
use crate::coordinator::{
    PagedFetchCoordinator, RunOutcome, RunSummary, ShardConfig, ShardedFetch,
};
use crate::error::{Error, Result, ResultExt};
use crate::pipeline::{
    EntryProcessingPipeline, EtlProcessor, PaymentPathProcessor, SchemaDiscoveryProcessor,
};
use crate::resolve::{RpcResolver, RpcResolverConfig};
use crate::schema::{
    list_builtin_schemas, load_builtin_schema, resolve_schema, AttributeSchemaCollector,
    KindNaming, SchemaMapping,
};
use crate::sink::{build_sink, ForwardConfig};
use crate::transform::{build_transformer, TransformConfig, TransformPreset};
use crate::transport::WebSocketTransport;
use crate::types::{JsonValue, Kind, OptionStringExt, Record};
use crate::validate::{PassthroughValidator, SchemaValidator, Validator};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Fetch(args) => self.fetch(args).await,
            Commands::Schema(command) => self.schema(command),
            Commands::Validate {
                input,
                schema,
                transform,
            } => self.validate(input, schema.as_deref(), *transform),
        }
    }

    /// Load the run configuration, or the defaults when none is given
    fn load_config(&self) -> Result<RunConfig> {
        match &self.cli.config {
            Some(path) => RunConfig::load(path),
            None => Ok(RunConfig::default()),
        }
    }

    // ========================================================================
    // fetch
    // ========================================================================

    async fn fetch(&self, args: &FetchArgs) -> Result<()> {
        let config = apply_fetch_args(self.load_config()?, args);

        let mut start = config.source.start;
        if start.is_current() {
            if let Some(rpc_url) = &config.source.rpc_url {
                let resolver = RpcResolver::new(
                    RpcResolverConfig::new(rpc_url.clone()).with_retry(config.retry.clone()),
                )?;
                start = resolver.resolve(start).await?;
                info!(%start, "resolved current page key");
            }
        }

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current page");
                on_interrupt.cancel();
            }
        });

        if let Some(sharded) = config.sharded_fetch(start)? {
            let result = fetch_sharded(&config, &sharded, args.payments, &cancel).await;
            cancel.cancel();
            return result;
        }

        let coordinator = PagedFetchCoordinator::new(config.coordinator_config(start)?);
        let mut pipeline = build_pipeline(&config, args.payments)?;
        let transport = WebSocketTransport::connect(&config.source.url).await?;

        let result = coordinator.run(transport, &mut pipeline, &cancel).await;
        cancel.cancel();

        // what was observed before a failure is still written
        if let Some(observed) = pipeline.observed() {
            write_observed(&config, observed)?;
        }
        log_summary(&result?);
        Ok(())
    }

    // ========================================================================
    // schema
    // ========================================================================

    fn schema(&self, command: &SchemaCommand) -> Result<()> {
        match command {
            SchemaCommand::Collect { input, format } => {
                let records = read_input(input)?;
                let mut collector = AttributeSchemaCollector::new();
                for record in &records {
                    collector.collect(record);
                }
                info!(
                    records = records.len(),
                    paths = collector.mapping().len(),
                    "schema collected"
                );
                print!("{}", format_mapping(collector.mapping(), *format)?);
            }
            SchemaCommand::Merge { inputs, format } => {
                let mut merged = SchemaMapping::new();
                for input in inputs {
                    let added = merged.merge(&SchemaMapping::load(input)?);
                    info!(path = %input.display(), added, "mapping merged");
                }
                print!("{}", format_mapping(&merged, *format)?);
            }
            SchemaCommand::Show { name, format } => {
                print!("{}", format_mapping(&load_builtin_schema(name)?, *format)?);
            }
            SchemaCommand::List => {
                for name in list_builtin_schemas() {
                    println!("{name}");
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // validate
    // ========================================================================

    fn validate(
        &self,
        input: &Path,
        schema: Option<&str>,
        transform: Option<TransformPreset>,
    ) -> Result<()> {
        let config = self.load_config()?;

        let validator: Box<dyn Validator> = match schema {
            Some(reference) => Box::new(SchemaValidator::new(resolve_schema(reference)?)),
            None => build_validator(&config)?,
        };
        let transformer = match transform {
            Some(preset) => build_transformer(&TransformConfig::preset(preset)),
            None => build_transformer(&config.transform),
        };

        for record in read_input(input)? {
            let output = transformer.transform(&validator.validate(&record));
            println!("{}", serde_json::to_string(&output)?);
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Run every shard concurrently and write the merged observed schema
async fn fetch_sharded(
    config: &RunConfig,
    sharded: &ShardedFetch,
    payments: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    // shards report once, from the merged mapping
    let mut shard_config = config.clone();
    shard_config.schema.report = false;

    let mut shards = Vec::new();
    for _ in 0..sharded.shard_count() {
        let transport = WebSocketTransport::connect(&config.source.url).await?;
        shards.push((transport, build_pipeline(&shard_config, payments)?));
    }

    let mut merged = SchemaMapping::new();
    let mut first_error = None;
    for outcome in sharded.run(shards, cancel).await? {
        if let Some(observed) = outcome.processor.observed() {
            merged.merge(observed);
        }
        match outcome.result {
            Ok(summary) => log_summary(&summary),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if config.schema.discover {
        if config.schema.report {
            info!(paths = merged.len(), "observed schema:\n{merged}");
        }
        write_observed(config, &merged)?;
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn log_summary(summary: &RunSummary) {
    match &summary.outcome {
        RunOutcome::Completed { page_key } => {
            info!(execution_id = %summary.execution_id, %page_key, "fetch completed");
        }
        RunOutcome::Cancelled { last_page_key } => {
            warn!(
                execution_id = %summary.execution_id,
                last_page_key = ?last_page_key.map(|k| k.to_string()),
                "fetch cancelled"
            );
        }
        RunOutcome::Empty => info!(execution_id = %summary.execution_id, "nothing to fetch"),
    }
    info!(
        requests = summary.stats.requests,
        pages = summary.stats.pages,
        records = summary.stats.records,
        retries = summary.stats.retries,
        duration_ms = summary.stats.duration_ms,
        "run statistics"
    );
}

fn write_observed(config: &RunConfig, observed: &SchemaMapping) -> Result<()> {
    if let Some(output) = &config.schema.output {
        write_mapping(Path::new(output), observed)?;
        info!(path = %output, paths = observed.len(), "observed schema written");
    }
    Ok(())
}

/// Apply `fetch` flags on top of a loaded configuration
pub fn apply_fetch_args(mut config: RunConfig, args: &FetchArgs) -> RunConfig {
    if let Some(url) = &args.url {
        config.source.url.clone_from(url);
    }
    // an empty value turns the resolver off
    if let Some(rpc_url) = &args.rpc_url {
        config.source.rpc_url = rpc_url.clone().none_if_empty();
    }
    if let Some(start) = args.start {
        config.source.start = start;
    }
    if args.repeat {
        config.source.repeat = true;
    }
    if let (Some(index), Some(size)) = (args.shard_index, args.shard_size) {
        config.source.shard = Some(ShardConfig { index, size });
        config.source.shards = None;
    }
    if args.shards.is_some() {
        config.source.shards = args.shards;
        config.source.shard = None;
    }
    if let Some(layout) = args.layout {
        config.layout.preset = layout;
    }

    if args.no_validate {
        config.schema.declared = None;
    } else if args.schema.is_some() {
        config.schema.declared.clone_from(&args.schema);
    }
    if let Some(output) = &args.schema_output {
        config.schema.output = Some(output.display().to_string());
    }
    if let Some(preset) = args.transform {
        config.transform = TransformConfig::preset(preset);
    }

    // explicit sink flags replace the configured selection
    if args.stdout || args.forward {
        config.sinks.console = args.stdout;
        config.sinks.forward = if args.forward {
            Some(config.sinks.forward.take().unwrap_or_default())
        } else {
            None
        };
    }
    if let Some(forward) = config.sinks.forward.as_mut() {
        apply_forward_args(forward, args);
    }
    config
}

fn apply_forward_args(forward: &mut ForwardConfig, args: &FetchArgs) {
    if let Some(host) = &args.forward_host {
        forward.host.clone_from(host);
    }
    if let Some(port) = args.forward_port {
        forward.port = port;
    }
    if let Some(tag) = &args.tag {
        forward.tag.clone_from(tag);
    }
    if let Some(environment) = args.environment {
        forward.environment = environment;
    }
}

fn build_validator(config: &RunConfig) -> Result<Box<dyn Validator>> {
    Ok(match config.declared_schema()? {
        Some(declared) => Box::new(SchemaValidator::new(declared)),
        None => Box::new(PassthroughValidator),
    })
}

/// Assemble the entry-processing pipeline for a run
pub fn build_pipeline(config: &RunConfig, payments: bool) -> Result<EntryProcessingPipeline> {
    let etl = EtlProcessor::new(
        build_validator(config)?,
        build_transformer(&config.transform),
        build_sink(&config.sinks)?,
    );

    let mut pipeline = EntryProcessingPipeline::new(etl);
    pipeline = if config.schema.discover {
        let discovery = SchemaDiscoveryProcessor::new().with_report_on_done(config.schema.report);
        pipeline.with_discovery(discovery)
    } else {
        pipeline.without_discovery()
    };
    if payments {
        pipeline = pipeline.with_processor(PaymentPathProcessor::new());
    }
    Ok(pipeline)
}

fn read_input(path: &Path) -> Result<Vec<Record>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    read_records(&contents).with_context(|| format!("Invalid records in {}", path.display()))
}

/// Parse records from a JSON array, a single JSON object, or JSON lines
pub fn read_records(contents: &str) -> Result<Vec<Record>> {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if let Ok(value) = serde_json::from_str::<JsonValue>(trimmed) {
        return match value {
            JsonValue::Array(items) => items.into_iter().map(into_record).collect(),
            other => Ok(vec![into_record(other)?]),
        };
    }

    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| into_record(serde_json::from_str(line)?))
        .collect()
}

fn into_record(value: JsonValue) -> Result<Record> {
    match value {
        JsonValue::Object(record) => Ok(record),
        other => Err(Error::NotARecord {
            kind: Kind::of(&other).to_string(),
        }),
    }
}

fn format_mapping(mapping: &SchemaMapping, format: SchemaFormat) -> Result<String> {
    Ok(match format {
        SchemaFormat::Plain => mapping.format_with("\t", KindNaming::Plain),
        SchemaFormat::Warehouse => mapping.format_with("\t", KindNaming::Warehouse),
        SchemaFormat::Yaml => serde_yaml::to_string(mapping)?,
        SchemaFormat::Json => format!("{}\n", serde_json::to_string_pretty(mapping)?),
    })
}

/// Write a mapping so that it can be loaded back as a declared schema
fn write_mapping(path: &Path, mapping: &SchemaMapping) -> Result<()> {
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => SchemaFormat::Json,
        _ => SchemaFormat::Yaml,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format_mapping(mapping, format)?)?;
    Ok(())
}
