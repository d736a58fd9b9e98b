use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::Parser;
use docmeta_capture::{
    settings, FieldAssignment, FieldRegion, HttpCatalog, IngestionClient, Region,
    SessionContext, SubmitOutcome, TesseractRecognizer,
};

#[derive(Parser, Debug)]
#[command(
    name = "docmeta-capture",
    version,
    about = "Capture document metadata from OCR regions and submit it to a DMS"
)]
struct Cli {
    /// Document to capture (png/jpg/jpeg/pdf)
    #[arg(short = 'd', long = "data")]
    data: Option<String>,

    /// Document type id or label
    #[arg(short = 't', long = "doctype")]
    doctype: Option<String>,

    /// Page number to work on (1-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Display-to-source scale factor for region coordinates
    #[arg(short = 's', long = "scale")]
    scale: Option<f64>,

    /// OCR a region into a field: FIELD=x,y,w,h (repeatable)
    #[arg(long = "region", value_name = "FIELD=x,y,w,h")]
    regions: Vec<String>,

    /// Set a field value: FIELD=VALUE (repeatable, applied after regions)
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    assignments: Vec<String>,

    /// Path of the JSON artifact (default from settings [output])
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Leave region annotations out of the record
    #[arg(long = "no-annotations")]
    no_annotations: bool,

    /// Post the record to the ingestion endpoint after writing it
    #[arg(long = "submit")]
    submit: bool,

    /// Show document types from the catalog and exit
    #[arg(long = "show-document-types")]
    show_document_types: bool,

    /// Show metadata fields of --doctype and exit
    #[arg(long = "show-fields")]
    show_fields: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,

    /// Interactive mode
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    docmeta_capture::logging::init(cli.verbose)?;
    if cli.interactive {
        return run_interactive(cli).await;
    }

    let regions = cli
        .regions
        .iter()
        .map(|value| FieldRegion::parse(value))
        .collect::<Result<Vec<_>>>()?;
    let assignments = cli
        .assignments
        .iter()
        .map(|value| FieldAssignment::parse(value))
        .collect::<Result<Vec<_>>>()?;

    let output = docmeta_capture::run(docmeta_capture::Config {
        data: cli.data,
        doctype: cli.doctype,
        page: cli.page,
        scale: cli.scale,
        regions,
        assignments,
        output: cli.output,
        no_annotations: cli.no_annotations,
        submit: cli.submit,
        settings_path: cli.read_settings,
        show_document_types: cli.show_document_types,
        show_fields: cli.show_fields,
    })
    .await?;

    println!("{}", output);
    Ok(())
}

struct InteractiveState {
    session: SessionContext,
    catalog: HttpCatalog,
    recognizer: TesseractRecognizer,
    ingestion: IngestionClient,
}

impl InteractiveState {
    fn new(cli: &Cli) -> Result<Self> {
        let settings = settings::load_settings(cli.read_settings.as_deref().map(Path::new))?;
        let catalog = HttpCatalog::from_settings(&settings)?;
        let recognizer = TesseractRecognizer::from_settings(&settings);
        let ingestion = IngestionClient::from_settings(&settings)?;
        let mut session = SessionContext::new(settings);
        if let Some(output) = cli.output.as_deref() {
            session.set_output_path(output);
        }
        if cli.no_annotations {
            session.set_include_annotations(false);
        }
        if let Some(scale) = cli.scale {
            session.set_scale(scale)?;
        }
        Ok(Self {
            session,
            catalog,
            recognizer,
            ingestion,
        })
    }
}

async fn run_interactive(cli: Cli) -> Result<()> {
    use std::io::Write;

    let mut state = InteractiveState::new(&cli)?;
    println!("Interactive mode. Use /quit or /exit to finish.");
    println!("Type /help to see available commands.");

    let mut startup = Vec::new();
    if let Some(data) = cli.data.as_deref() {
        startup.push(format!("/open {}", data));
    }
    if let Some(page) = cli.page {
        startup.push(format!("/page {}", page));
    }
    if let Some(doctype) = cli.doctype.as_deref() {
        startup.push(format!("/doctype {}", doctype));
    }
    for command in startup {
        if let Err(err) = handle_interactive_command(&command, &mut state).await {
            eprintln!("error: {:#}", err);
        }
    }

    let mut line = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();
    loop {
        line.clear();
        print!("> ");
        io::stdout().flush()?;
        if stdin_lock.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if !input.starts_with('/') {
            eprintln!("commands start with '/'; type /help");
            continue;
        }
        match handle_interactive_command(input, &mut state).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => eprintln!("error: {:#}", err),
        }
    }
    Ok(())
}

/// Splits `/word rest` into the command word and its trimmed argument.
fn split_command(input: &str) -> (&str, &str) {
    let trimmed = input.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (trimmed, ""),
    }
}

async fn handle_interactive_command(input: &str, state: &mut InteractiveState) -> Result<bool> {
    let (command, arg) = split_command(input);
    match command {
        "/quit" | "/exit" => return Ok(true),
        "/help" => print_interactive_help(),
        "/doctypes" => {
            let types = state.session.refresh_document_types(&state.catalog).await?;
            println!("{}", docmeta_capture::format_document_types(types));
        }
        "/fields" => println!("{}", docmeta_capture::format_fields(state.session.fields())),
        "/values" => println!("{}", docmeta_capture::format_values(&state.session)),
        "/validate" => {
            let errors = state.session.validate();
            if errors.is_empty() {
                println!("all fields valid");
            } else {
                for message in errors {
                    println!("{}", message);
                }
            }
        }
        "/submit" => {
            let report = state.session.submit(Some(&state.ingestion)).await?;
            println!("saved {}", report.artifact.display());
            match report.outcome {
                Some(SubmitOutcome::Accepted) => {
                    println!("Data submission completed successfully!")
                }
                Some(SubmitOutcome::Rejected { status }) => {
                    eprintln!("Failed to send data to the API: {}", status)
                }
                None => {}
            }
        }
        "/open" => {
            if arg.is_empty() {
                return Err(anyhow!("usage: /open <path>"));
            }
            let document = state.session.load_document(Path::new(arg))?;
            println!("{}: {}", document.file().name, document.caption());
        }
        "/doctype" => {
            if arg.is_empty() {
                match state.session.document_type() {
                    Some(doc) => println!("doctype: {} ({})", doc.label, doc.id),
                    None => println!("doctype: (none)"),
                }
            } else {
                let doc = state
                    .session
                    .select_document_type(&state.catalog, arg)
                    .await?;
                println!("doctype set to {} ({})", doc.label, doc.id);
                println!("{}", docmeta_capture::format_fields(state.session.fields()));
            }
        }
        "/field" => {
            if arg.is_empty() {
                match state.session.active_field() {
                    Some(field) => println!("field: {}", field.display_label()),
                    None => println!("field: (none)"),
                }
            } else {
                let field = state.session.select_field(arg)?;
                println!("field set to {}", field.display_label());
            }
        }
        "/page" => {
            let document = state.session.document_mut()?;
            match arg {
                "" => {}
                "next" => {
                    document.next_page();
                }
                "prev" => {
                    document.prev_page();
                }
                number => {
                    let number = number
                        .parse::<usize>()
                        .map_err(|_| anyhow!("expected a page number, next, or prev"))?;
                    document.goto_page(number)?;
                }
            }
            println!("{}", document.caption());
        }
        "/scale" => {
            if !arg.is_empty() {
                let scale = arg
                    .parse::<f64>()
                    .map_err(|_| anyhow!("expected a number"))?;
                state.session.set_scale(scale)?;
            }
            println!("scale: {}", state.session.scale());
        }
        "/preview" => {
            let mut parts = arg.split_whitespace();
            let path = parts
                .next()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("usage: /preview <png> [width]"))?;
            let width = parts
                .next()
                .map(|value| {
                    value
                        .parse::<u32>()
                        .map_err(|_| anyhow!("width must be a positive integer"))
                })
                .transpose()?;
            let scale = state.session.export_preview(&path, width)?;
            println!("preview written to {} (scale {:.3})", path.display(), scale);
        }
        "/region" => {
            let region = Region::parse(arg)?;
            let extraction = state.session.draw_region(region, &state.recognizer)?;
            let field = state
                .session
                .active_field()
                .map(|field| field.label.clone())
                .unwrap_or_default();
            println!("{}", docmeta_capture::format_extraction(&field, &extraction));
        }
        "/set" => {
            let assignment = FieldAssignment::parse(arg)?;
            if let Some(warning) = state
                .session
                .set_value(&assignment.field, &assignment.value)?
            {
                eprintln!("{}", warning);
            }
        }
        "/clear" => {
            if arg.is_empty() {
                return Err(anyhow!("usage: /clear <field>"));
            }
            state.session.clear_value(arg)?;
        }
        "/annotations" => {
            let include = parse_toggle(arg, state.session.include_annotations())?;
            state.session.set_include_annotations(include);
            println!("annotations: {}", include);
        }
        "/output" => {
            if !arg.is_empty() {
                state.session.set_output_path(arg);
            }
            println!("output: {}", state.session.output_path().display());
        }
        _ => eprintln!("unknown command: {}", command),
    }
    Ok(false)
}

fn parse_toggle(arg: &str, current: bool) -> Result<bool> {
    let value = arg.trim();
    if value.is_empty() {
        return Ok(!current);
    }
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(anyhow!("expected on/off/true/false/1/0")),
    }
}

fn print_interactive_help() {
    println!("Commands:");
    println!("  /quit, /exit                 Exit interactive mode");
    println!("  /open <path>                 Load an image or PDF");
    println!("  /doctypes                    List document types");
    println!("  /doctype <id|label>          Select document type (or show current)");
    println!("  /fields                      List metadata fields");
    println!("  /field <id|label>            Select the field OCR text goes to");
    println!("  /page <n|next|prev>          Change page (or show current)");
    println!("  /scale <factor>              Set display-to-source scale");
    println!("  /preview <png> [width]       Export current page and adopt its scale");
    println!("  /region <x> <y> <w> <h>      OCR a region into the active field");
    println!("  /set <field>=<value>         Set a field value");
    println!("  /clear <field>               Clear a field value");
    println!("  /values                      Show current values");
    println!("  /validate                    Check values without submitting");
    println!("  /annotations [on|off]        Toggle region annotations in the record");
    println!("  /output <path>               Set artifact path (or show current)");
    println!("  /submit                      Validate, write the artifact, and post it");
}
