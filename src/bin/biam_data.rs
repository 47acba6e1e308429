use std::path::PathBuf;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use biam_paragraphs::{
    DataModuleRegistry, DatasetSplit, FormsSource, ParagraphCache, PipelineConfig,
    convert_strings_to_labels, extract_archive, load_pipeline_config,
    validate_input_and_output_dimensions,
};
use biam_paragraphs::tokenizer::{load_vocab, tokenize_paragraph};

#[derive(Parser, Debug)]
#[command(author, version, about = "Prepare and inspect the B_IAM paragraph dataset")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct GlobalArgs {
    /// Additional configuration files applied in order (later files override earlier ones).
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    config: Vec<PathBuf>,
    /// Data module to build.
    #[arg(long, default_value = "b_iam_paragraphs", global = true)]
    data_module: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Unpack the raw archive if it has not been extracted yet.
    Extract,
    /// Build the crop/label cache and properties file.
    Prepare,
    /// Print dataset summaries.
    Info,
    /// Check configured dimensions against the prepared data.
    Validate,
    /// Show how a label string is tokenized and encoded.
    Encode {
        text: String,
        /// Output length; defaults to the configured maximum label length.
        #[arg(long)]
        length: Option<usize>,
    },
    /// Print one processed label per line for a split.
    Labels {
        #[arg(value_parser = clap::value_parser!(DatasetSplit))]
        split: DatasetSplit,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("biam_paragraphs=info,biam_data=info")),
        )
        .init();

    let args = Cli::parse();
    let mut config_paths = vec![PathBuf::from("config/base.toml")];
    config_paths.extend(args.global.config.clone());
    let config = load_pipeline_config(&config_paths)?;

    match &args.command {
        Command::Extract => {
            let extracted = extract_archive(&config.dataset.archive_path, &config.dataset.extracted_dir)?;
            if !extracted {
                info!("{} already extracted", config.dataset.extracted_dir.display());
            }
        }
        Command::Prepare => {
            let registry = DataModuleRegistry::with_defaults();
            let module = registry.build(&args.global.data_module, &config)?;
            module.prepare_data()?;
        }
        Command::Info => print_info(&config, &args.global.data_module)?,
        Command::Validate => {
            let properties = ParagraphCache::new(&config.dataset).properties()?;
            validate_input_and_output_dimensions(
                &config.dataset.dims.input_dims(),
                &config.dataset.dims.output_dims(),
                &properties,
                config.dataset.image_scale_factor,
            )?;
            println!("{}", serde_json::to_string_pretty(&properties)?);
            info!("configured dimensions cover the prepared dataset");
        }
        Command::Encode { text, length } => {
            let vocab = load_vocab(&config.dataset)?;
            let length = length.unwrap_or(config.dataset.dims.max_label_length);
            let tokens = tokenize_paragraph(text);
            let rows = convert_strings_to_labels(&[text.as_str()], &vocab, length);
            println!("tokens: {tokens:?}");
            println!("ids: {:?}", rows.first().map(Vec::as_slice).unwrap_or_default());
            if tokens.len() > length {
                info!("{} tokens truncated to {length}", tokens.len());
            }
        }
        Command::Labels { split } => {
            let processed = ParagraphCache::new(&config.dataset).load(*split)?;
            for (id, label) in processed.ids.iter().zip(&processed.labels) {
                println!("{id}\t{}", label.replace('\n', "\\n"));
            }
        }
    }

    Ok(())
}

fn print_info(config: &PipelineConfig, data_module: &str) -> Result<()> {
    let forms = FormsSource::new(&config.dataset);
    forms.prepare_data()?;
    println!("{}", forms.summary()?);

    let registry = DataModuleRegistry::with_defaults();
    let mut module = registry.build(data_module, config)?;
    module.setup(None)?;
    println!("{module}");
    Ok(())
}
