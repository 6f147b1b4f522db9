#[macro_use]
extern crate clap;

use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use clap::App;
use dialoguer::console::{Emoji, style};

use quake_alert::cli::{self, CliError};
use quake_alert::inference::Pipeline;
use quake_alert::reconcile::{self, Reconciled, Table};
use quake_alert::report::{self, Summary, Theme};
use quake_alert::report::export::{self, ExportFormat};
use quake_alert::schema::Schema;
use quake_alert::shared_interface::AlertLevel;

static LOADING: Emoji<'_, '_> = Emoji("⏳ ", "");
static WORKING: Emoji<'_, '_> = Emoji("🛠️ ", "");
static SAVING: Emoji<'_, '_> = Emoji("💾 ", "");
static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

/// Rows predicted between progress bar updates.
const CHUNK_SIZE: usize = 1000;

#[derive(Debug)]
pub struct Output {
    path: PathBuf,
    gzip: bool,
    format: ExportFormat,
}

#[derive(Debug)]
pub struct Opts {
    pub input: PathBuf,
    pub delimiter: Option<u8>,
    pub scaler: PathBuf,
    pub model: PathBuf,
    pub schema: Option<PathBuf>,
    output: Option<Output>,
    theme: Theme,
    quiet: bool,
}

fn parse_opts() -> Result<Opts, CliError> {
    let yml = load_yaml!("cli_args.yaml");
    let m = App::from_yaml(yml).get_matches();

    let quiet = m.is_present("quiet");

    let delimiter = match m.value_of("delimiter") {
        Some(d) => Some(cli::parse_delimiter(d)?),
        None => None,
    };
    let schema = match m.value_of("schema") {
        Some(path) => Some(cli::parse_input_path(Some(path), "schema")?),
        None => None,
    };
    let theme = m.value_of("theme").unwrap_or("dark").parse()
        .map_err(|e| CliError::InvalidArg("theme".to_string(), e))?;

    // Confirm overwriting before doing any work, the file is only created once predictions exist
    let output = match m.value_of("output") {
        Some(path) => {
            let path_buf = PathBuf::from(path);
            let format = match m.value_of("format") {
                Some(f) => f.parse().map_err(|e| CliError::InvalidArg("format".to_string(), e))?,
                None => ExportFormat::from_path(&path_buf).unwrap_or(ExportFormat::Csv),
            };
            Some(Output {
                path: cli::parse_output_path(path, m.is_present("yes"))?,
                gzip: export::is_gzip(&path_buf),
                format,
            })
        }
        None => None,
    };

    Ok(Opts {
        input: cli::parse_input_path(m.value_of("input"), "input")?,
        delimiter,
        scaler: cli::parse_input_path(m.value_of("scaler"), "scaler")?,
        model: cli::parse_input_path(m.value_of("model"), "model")?,
        schema,
        output,
        theme,
        quiet,
    })
}

fn load(opts: &Opts) -> Result<(Schema, Pipeline), Box<dyn Error>> {
    cli::print_output(format!("\n{}   {}Loading model artifacts...\n", style("[1/3]").bold().dim(), LOADING), opts.quiet);

    let schema = match &opts.schema {
        Some(path) => Schema::load(path)?,
        None => Schema::default(),
    };
    let pipeline = Pipeline::load(&opts.scaler, &opts.model)?;

    Ok((schema, pipeline))
}

fn read_input(opts: &Opts, schema: &Schema) -> Result<Reconciled, Box<dyn Error>> {
    cli::print_output(format!("\n{}   {}Reading {}...\n", style("[2/3]").bold().dim(), LOADING, opts.input.display()), opts.quiet);

    let table = Table::open(&opts.input, opts.delimiter)?;
    let reconciled = reconcile::reconcile(table, schema)?;

    cli::print_output(report::render_warnings(&reconciled.warnings, opts.theme), opts.quiet);
    Ok(reconciled)
}

fn predict(opts: &Opts, pipeline: &Pipeline, reconciled: &Reconciled) -> Vec<AlertLevel> {
    cli::print_output(format!("\n{}   {}Predicting alert levels...\n", style("[3/3]").bold().dim(), WORKING), opts.quiet);

    let pb = cli::make_progress_bar(reconciled.features.len() as u64, opts.quiet);

    let mut labels = Vec::with_capacity(reconciled.features.len());
    for chunk in reconciled.features.chunks(CHUNK_SIZE) {
        labels.extend(pipeline.predict_batch(chunk));
        if let Some(pb) = &pb { pb.inc(chunk.len() as u64); }
    }
    if let Some(pb) = &pb { pb.finish(); }

    labels
}

fn run() -> Result<(), Box<dyn Error>> {
    let opts = parse_opts()?;
    cli::init_tracing(opts.quiet);

    let start = Instant::now();

    let (schema, pipeline) = load(&opts)?;
    let reconciled = read_input(&opts, &schema)?;
    let labels = predict(&opts, &pipeline, &reconciled);

    print!("\n{}", Summary::from_labels(&labels).render(opts.theme));

    if let Some(output) = opts.output {
        cli::print_output(format!("\n        {}Writing {} export...\n", SAVING, format!("{:?}", output.format).to_lowercase()), opts.quiet);
        let file = cli::create_output_file(&output.path)?;
        export::write_export_file(file, output.gzip, &reconciled.table, &labels, output.format)?;
    }

    // Print total duration
    cli::print_output(format!("\n        {}Finished in {:.1?}\n", SPARKLE, start.elapsed()), opts.quiet);
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        cli::exit_with_error(e);
    }
}
