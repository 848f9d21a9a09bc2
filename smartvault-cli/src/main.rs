/*!
SmartVault CLI - Command-line interface for the EBS backup system.

This CLI drives the backup orchestration core against AWS: one-shot full
invocations, standalone retention passes, and snapshot inspection.
*/

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::info;

use smartvault_core::services::{
    CloudWatchMetrics, Ec2Inventory, Ec2SnapshotStore, LocalMetadataExport, S3MetadataExport,
    SnapshotService, SnsNotifier,
};
use smartvault_core::{
    prune_expired, BackupConfig, BackupRunner, DeviceSelection, DEFAULT_RETENTION_DAYS,
    TAG_BACKUP_DATE,
};

#[derive(Parser)]
#[command(name = "smartvault")]
#[command(about = "CLI for the SmartVault EBS backup system")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// AWS region to operate in (defaults to the environment)
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one full backup invocation
    Run {
        /// SNS topic notifications are published to
        #[arg(long, env = "SNS_TOPIC_ARN")]
        topic_arn: String,

        /// Retention window in days for the pruning stage
        #[arg(long, env = "RETENTION_DAYS", default_value_t = DEFAULT_RETENTION_DAYS)]
        retention_days: u32,

        /// Destination region for cross-region snapshot replication
        #[arg(long, env = "REPLICA_REGION")]
        replica_region: Option<String>,

        /// S3 bucket receiving snapshot metadata exports
        #[arg(long, env = "SNAPSHOT_BUCKET")]
        export_bucket: Option<String>,

        /// Local directory receiving metadata exports instead of S3
        #[arg(long, conflicts_with = "export_bucket")]
        export_dir: Option<PathBuf>,

        /// Skip volume size lookups (no storage telemetry)
        #[arg(long)]
        skip_storage_metrics: bool,

        /// Continue past per-candidate failures instead of aborting the run
        #[arg(long)]
        isolate_failures: bool,

        /// Back up the device with this name instead of the first attachment
        #[arg(long)]
        device_name: Option<String>,
    },
    /// Run only the retention pass
    Prune {
        /// Retention window in days
        #[arg(long, env = "RETENTION_DAYS", default_value_t = DEFAULT_RETENTION_DAYS)]
        retention_days: u32,
    },
    /// List lifecycle-tagged snapshots
    List,
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "Snapshot ID")]
    id: String,
    #[tabled(rename = "Instance")]
    instance: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Age (days)")]
    age: String,
    #[tabled(rename = "Size")]
    size: String,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let sdk_config = load_sdk_config(cli.region.clone()).await?;

    match cli.command {
        Commands::Run {
            topic_arn,
            retention_days,
            replica_region,
            export_bucket,
            export_dir,
            skip_storage_metrics,
            isolate_failures,
            device_name,
        } => {
            run_backup(
                &sdk_config,
                RunOptions {
                    topic_arn,
                    retention_days,
                    replica_region,
                    export_bucket,
                    export_dir,
                    skip_storage_metrics,
                    isolate_failures,
                    device_name,
                },
            )
            .await
        }
        Commands::Prune { retention_days } => prune_snapshots(&sdk_config, retention_days).await,
        Commands::List => list_snapshots(&sdk_config).await,
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn load_sdk_config(region: Option<String>) -> Result<aws_config::SdkConfig, anyhow::Error> {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region));
    }
    let sdk_config = loader.load().await;

    if sdk_config.credentials_provider().is_none() {
        anyhow::bail!(
            "AWS credentials not found. Please set AWS_ACCESS_KEY_ID, \
             AWS_SECRET_ACCESS_KEY, and AWS_REGION"
        );
    }
    Ok(sdk_config)
}

struct RunOptions {
    topic_arn: String,
    retention_days: u32,
    replica_region: Option<String>,
    export_bucket: Option<String>,
    export_dir: Option<PathBuf>,
    skip_storage_metrics: bool,
    isolate_failures: bool,
    device_name: Option<String>,
}

async fn run_backup(
    sdk_config: &aws_config::SdkConfig,
    opts: RunOptions,
) -> Result<(), anyhow::Error> {
    let ec2 = aws_sdk_ec2::Client::new(sdk_config);

    let mut config = BackupConfig::new().with_retention_days(opts.retention_days);
    config.collect_storage_metrics = !opts.skip_storage_metrics;
    config.isolate_snapshot_failures = opts.isolate_failures;
    config.source_region = sdk_config.region().map(|r| r.to_string());
    if let Some(name) = opts.device_name {
        config.device_selection = DeviceSelection::ByDeviceName(name);
    }

    let mut store = Ec2SnapshotStore::new(ec2.clone());
    if let Some(replica_region) = opts.replica_region {
        config.replica_region = Some(replica_region.clone());
        let replica_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(replica_region))
            .load()
            .await;
        store = store.with_replica_client(aws_sdk_ec2::Client::new(&replica_config));
    }

    let mut runner = BackupRunner::new(
        Arc::new(Ec2Inventory::new(ec2)),
        Arc::new(store),
        Arc::new(CloudWatchMetrics::new(aws_sdk_cloudwatch::Client::new(
            sdk_config,
        ))),
        Arc::new(SnsNotifier::new(
            aws_sdk_sns::Client::new(sdk_config),
            opts.topic_arn,
        )),
        config,
    );

    if let Some(bucket) = opts.export_bucket {
        runner = runner.with_exporter(Arc::new(S3MetadataExport::new(
            aws_sdk_s3::Client::new(sdk_config),
            bucket,
        )));
    } else if let Some(dir) = opts.export_dir {
        runner = runner.with_exporter(Arc::new(LocalMetadataExport::new(dir)));
    }

    let response = runner.invoke().await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn prune_snapshots(
    sdk_config: &aws_config::SdkConfig,
    retention_days: u32,
) -> Result<(), anyhow::Error> {
    info!(retention_days, "Running standalone retention pass");

    let store = Ec2SnapshotStore::new(aws_sdk_ec2::Client::new(sdk_config));
    let report = prune_expired(&store, retention_days, chrono::Utc::now()).await?;

    println!(
        "Examined {} tagged snapshots; deleted {}, {} failed",
        report.examined,
        report.deleted.len(),
        report.failed
    );
    for id in &report.deleted {
        println!("  deleted {id}");
    }
    Ok(())
}

async fn list_snapshots(sdk_config: &aws_config::SdkConfig) -> Result<(), anyhow::Error> {
    let store = Ec2SnapshotStore::new(aws_sdk_ec2::Client::new(sdk_config));
    let mut records = store.snapshots_with_tag_key(TAG_BACKUP_DATE).await?;

    if records.is_empty() {
        println!("No snapshots found");
        return Ok(());
    }
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let now = chrono::Utc::now();
    let rows: Vec<SnapshotRow> = records
        .into_iter()
        .map(|record| SnapshotRow {
            id: record.snapshot_id,
            instance: record
                .source_instance_id
                .unwrap_or_else(|| "-".to_string()),
            created: record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            age: format!(
                "{:.1}",
                (now - record.created_at).num_seconds() as f64 / 86_400.0
            ),
            size: record
                .size_gib
                .map(|s| format!("{s} GiB"))
                .unwrap_or_else(|| "Unknown".to_string()),
        })
        .collect();

    let table = Table::new(rows);
    println!("{table}");
    Ok(())
}
