#[macro_use]
extern crate clap;

use std::error::Error;
use std::io::BufReader;
use std::path::PathBuf;

use clap::{App, ArgMatches};

use quake_alert::cli::{self, CliError};
use quake_alert::encoding::form::EventForm;
use quake_alert::inference::Pipeline;
use quake_alert::report::{self, Theme};
use quake_alert::schema::Schema;
use quake_alert::shared_interface::Feature;

#[derive(Debug)]
pub struct Opts {
    pub scaler: PathBuf,
    pub model: PathBuf,
    pub schema: Option<PathBuf>,
    pub form: Option<PathBuf>,
    theme: Theme,
    quiet: bool,
}

fn parse_opts(m: &ArgMatches) -> Result<Opts, CliError> {
    let schema = match m.value_of("schema") {
        Some(path) => Some(cli::parse_input_path(Some(path), "schema")?),
        None => None,
    };
    let form = match m.value_of("form") {
        Some(path) => Some(cli::parse_input_path(Some(path), "form")?),
        None => None,
    };
    let theme = m.value_of("theme").unwrap_or("dark").parse()
        .map_err(|e| CliError::InvalidArg("theme".to_string(), e))?;

    Ok(Opts {
        scaler: cli::parse_input_path(m.value_of("scaler"), "scaler")?,
        model: cli::parse_input_path(m.value_of("model"), "model")?,
        schema,
        form,
        theme,
        quiet: m.is_present("quiet"),
    })
}

/// Start from the form file (or schema defaults) and apply command line values.
fn build_form(m: &ArgMatches, opts: &Opts, schema: &Schema) -> Result<EventForm, Box<dyn Error>> {
    let mut form = match &opts.form {
        Some(path) => {
            let file = std::fs::File::open(path).map_err(|e| CliError::IO(path.display().to_string(), e))?;
            serde_json::from_reader(BufReader::new(file))?
        }
        None => EventForm::with_defaults(schema),
    };

    for feature in Feature::ALL.iter().copied() {
        if let Some(raw) = m.value_of(feature.name()) {
            form.set(feature, raw)?;
        }
    }
    Ok(form)
}

fn run() -> Result<(), Box<dyn Error>> {
    let yml = load_yaml!("cli_args.yaml");
    let m = App::from_yaml(yml).get_matches();
    let opts = parse_opts(&m)?;

    cli::init_tracing(opts.quiet);

    let schema = match &opts.schema {
        Some(path) => Schema::load(path)?,
        None => Schema::default(),
    };

    // Fail before touching the input if the artifacts are unusable
    let pipeline = Pipeline::load(&opts.scaler, &opts.model)?;

    let form = build_form(&m, &opts, &schema)?;
    let mut warnings = Vec::new();
    let features = form.to_features(&schema, &mut warnings)?;

    cli::print_output(report::render_warnings(&warnings, opts.theme), opts.quiet);

    let level = pipeline.predict(&features);
    if opts.quiet {
        println!("{}", level);
    } else {
        print!("{}", report::render_prediction(level, opts.theme));
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        cli::exit_with_error(e);
    }
}
