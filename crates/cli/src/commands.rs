use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one job instance over a key range
    Run {
        #[arg(long, help = "Job file path")]
        config: String,

        #[arg(long, help = "First key of the range, overrides the job file")]
        start: Option<String>,

        #[arg(long, help = "Last key of the range, overrides the job file")]
        end: Option<String>,

        #[arg(
            long,
            conflicts_with_all = ["start", "end"],
            help = "Calendar month (YYYY-MM) to run a timestamp-keyed job over"
        )]
        month: Option<String>,

        #[arg(long, help = "Partition id, required when running ranges in parallel")]
        partition: Option<String>,

        #[arg(long, help = "If set, prints the job report as JSON")]
        json: bool,
    },
    /// Show the stored checkpoint of a job
    Progress {
        #[arg(long, help = "Job file path")]
        config: String,

        #[arg(long, help = "Partition id to inspect")]
        partition: Option<String>,

        #[arg(long, help = "Calendar month (YYYY-MM) of a month run")]
        month: Option<String>,

        #[arg(
            long,
            conflicts_with = "partition",
            help = "List the checkpoints of every partition of the job"
        )]
        all: bool,

        #[arg(
            long,
            help = "If set, prints the progress information as JSON instead of a table"
        )]
        json: bool,
    },
    /// Split an integer key range into disjoint partitions
    Partitions {
        #[arg(long)]
        start: i64,

        #[arg(long)]
        end: i64,

        #[arg(long)]
        count: usize,

        #[arg(long, help = "Job file path; when given, prints one run command per partition")]
        config: Option<String>,
    },
    /// Print the unified target mapping without creating anything
    Mapping {
        #[arg(long, help = "Job file path")]
        config: String,

        #[arg(
            long,
            help = "If specified, writes the mapping to this file instead of stdout"
        )]
        output: Option<String>,
    },
    /// Check that the document store answers
    Ping {
        #[arg(long, help = "Document store URL; defaults to REINDEX_STORE_URL")]
        url: Option<String>,
    },
}
