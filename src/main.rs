use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ejustice_finder::config::{find_config_file, load_config, load_env_config, Config, LogFormat};
use ejustice_finder::models::{
    FormFields, Language, OptionLists, SearchReport, SearchRequest, DEFAULT_SORT, DEFAULT_SOURCE,
};
use ejustice_finder::portal::{fetch_option_lists, fetch_search_meta};
use ejustice_finder::SearchPipeline;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// eJustice Finder - Search Belgian judicial decisions and resolve their PDFs
#[derive(Parser, Debug)]
#[command(name = "ejustice")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search the eJustice portal for judicial decisions", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in seconds (overrides the configuration)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
}

/// Portal interface language
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Lang {
    Nl,
    Fr,
    De,
}

impl From<Lang> for Language {
    fn from(lang: Lang) -> Self {
        match lang {
            Lang::Nl => Language::Nl,
            Lang::Fr => Language::Fr,
            Lang::De => Language::De,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search decisions and resolve their documents
    #[command(alias = "s")]
    Search {
        /// Free-text search term
        text: String,

        /// Source filter
        #[arg(long, short, default_value = DEFAULT_SOURCE)]
        source: String,

        /// Sort key
        #[arg(long, default_value = DEFAULT_SORT)]
        sort: String,

        #[arg(long, short, value_enum, default_value_t = Lang::Nl)]
        language: Lang,

        /// Number of records to return
        #[arg(long, short = 'n', default_value_t = 10)]
        count: usize,

        /// Number of leading records to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Also fetch the search form's option lists
        #[arg(long)]
        with_options: bool,
    },

    /// Show the hit counters of a search without listing records
    Meta {
        text: String,

        #[arg(long, short, default_value = DEFAULT_SOURCE)]
        source: String,

        #[arg(long, short, value_enum, default_value_t = Lang::Nl)]
        language: Lang,
    },

    /// Show the option lists of the search form for a language letter (n, f, d)
    Options { letter: String },

    /// Resolve one record from its form fields (`name=value` pairs)
    Resolve {
        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Run the HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("expected `name=value`, got `{}`", raw))
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(path) = &cli.config {
        load_config(path).with_context(|| format!("loading {}", path.display()))?
    } else if let Some(path) = find_config_file() {
        load_config(&path).with_context(|| format!("loading {}", path.display()))?
    } else {
        load_env_config()?
    };

    if let Some(timeout) = cli.timeout {
        config.backend.request_timeout_secs = timeout;
    }
    Ok(config)
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("ejustice_finder={}", level)),
    );

    // Logs go to stderr so JSON results on stdout stay parseable.
    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    init_tracing(&cli, &config);

    let format = match cli.output {
        OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
        OutputFormat::Auto => OutputFormat::Json,
        other => other,
    };

    match cli.command {
        Commands::Search {
            text,
            source,
            sort,
            language,
            count,
            offset,
            with_options,
        } => {
            let request = SearchRequest::new(text)
                .source(source)
                .sort(sort)
                .language(language.into())
                .count(count)
                .offset(offset)
                .with_options(with_options);

            let pipeline = SearchPipeline::from_config(&config)?;
            let report = pipeline.run(&request).await?;
            output_report(&report, format)?;
        }

        Commands::Meta {
            text,
            source,
            language,
        } => {
            let request = SearchRequest::new(text)
                .source(source)
                .language(language.into());
            request
                .validate()
                .map_err(|msg| anyhow::anyhow!("invalid search: {}", msg))?;

            let pipeline = SearchPipeline::from_config(&config)?;
            let transport = pipeline.transport();
            let meta =
                fetch_search_meta(transport.as_ref(), pipeline.endpoints(), &request.search_form())
                    .await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&meta)?),
                _ => {
                    println!("Documents: {}", meta.nr_docs_found);
                    println!("Sources:   {}", meta.nr_sources_found);
                    println!("Words:     {}", meta.nr_words_found);
                }
            }
        }

        Commands::Options { letter } => {
            let pipeline = SearchPipeline::from_config(&config)?;
            let transport = pipeline.transport();
            let lists = fetch_option_lists(transport.as_ref(), pipeline.endpoints(), &letter).await?;
            output_option_lists(&lists, format)?;
        }

        Commands::Resolve { fields } => {
            let form: FormFields = fields.into_iter().collect();
            let pipeline = SearchPipeline::from_config(&config)?;
            let resolution = pipeline.resolver().resolve(&form).await?;
            println!("{}", pipeline.endpoints().document_url(&resolution.pdf_url));
        }

        Commands::Serve { host, port } => {
            let mut server_config = config.server.clone();
            if let Some(host) = host {
                server_config.host = host;
            }
            if let Some(port) = port {
                server_config.port = port;
            }

            let pipeline = Arc::new(SearchPipeline::from_config(&config)?);
            ejustice_finder::server::serve(&server_config, pipeline).await?;
        }

        Commands::Config {
            command: ConfigCommands::Show,
        } => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn output_report(report: &SearchReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    use comfy_table::{Attribute, Cell, Table};
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["#", "Published", "Title", "PDF"]);

    for (index, doc) in report.details.iter().enumerate() {
        let title = if doc.text.chars().count() > 60 {
            format!("{}...", doc.text.chars().take(57).collect::<String>())
        } else {
            doc.text.clone()
        };

        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(doc.labels.join(" ")),
            Cell::new(title).add_attribute(Attribute::Bold),
            Cell::new(doc.pdf_url.as_deref().unwrap_or("-")),
        ]);
    }

    println!(
        "{} documents, {} sources, {} words",
        report.nr_docs_found, report.nr_sources_found, report.nr_words_found
    );
    println!("{table}");
    Ok(())
}

fn output_option_lists(lists: &OptionLists, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(lists)?);
        return Ok(());
    }

    use comfy_table::Table;
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Field", "Values"]);
    for (name, values) in lists {
        table.add_row(vec![name.clone(), values.join("\n")]);
    }
    println!("{table}");
    Ok(())
}
