use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use study_cli::{
    client_for, logging, run_simulation, serve, AppState, HostConfig, LogFormat, Mode,
    SimulationConfig, StudyHost,
};
use study_content::{lint_bank, load_bank, ContentBank, LintRules, Severity, StudyBundle};
use study_engine::{BuildPolicy, ConfidenceRatingHook, ParticipantData};
use tracing::info;

fn cli() -> Command {
    Command::new("study")
        .version(study_cli::VERSION)
        .about("Study engine host: build surveys, lint banks, simulate balance, serve the API")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Host configuration file (TOML)"),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .global(true)
                .help("Allocation source: local or networked"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .help("Log output: text or json"),
        )
        .subcommand(
            Command::new("build")
                .about("Build one participant's survey and print it as JSON")
                .arg(study_dir_arg())
                .arg(
                    Arg::new("participant")
                        .long("participant")
                        .value_parser(value_parser!(PathBuf))
                        .help("Participant attributes (JSON object)"),
                )
                .arg(Arg::new("uuid").long("uuid").help("Participant id (default: random)"))
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducible builds"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Fail on the first section error instead of skipping it"),
                )
                .arg(
                    Arg::new("confidence")
                        .long("confidence")
                        .action(ArgAction::SetTrue)
                        .help("Add a confidence rating page after each block"),
                ),
        )
        .subcommand(
            Command::new("lint")
                .about("Check a content bank")
                .arg(
                    Arg::new("bank")
                        .long("bank")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Bank document (JSON or YAML)"),
                )
                .arg(
                    Arg::new("require-construct")
                        .long("require-construct")
                        .action(ArgAction::Append)
                        .help("Construct every block must cover (repeatable)"),
                )
                .arg(
                    Arg::new("require-explanations")
                        .long("require-explanations")
                        .action(ArgAction::SetTrue)
                        .help("Treat missing explanations as errors"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run assign/submit cycles and report balance")
                .arg(
                    Arg::new("participants")
                        .long("participants")
                        .default_value("1000")
                        .value_parser(value_parser!(usize))
                        .help("Number of participants"),
                )
                .arg(
                    Arg::new("items")
                        .long("items")
                        .required(true)
                        .value_delimiter(',')
                        .help("Candidate item types, comma separated"),
                )
                .arg(
                    Arg::new("strata")
                        .long("strata")
                        .value_delimiter(',')
                        .help("Strata, comma separated (default: global)"),
                )
                .arg(
                    Arg::new("completion-rate")
                        .long("completion-rate")
                        .default_value("1.0")
                        .value_parser(value_parser!(f64))
                        .help("Share of participants who submit"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve the study HTTP API")
                .arg(study_dir_arg())
                .arg(Arg::new("bind").long("bind").help("Listen address (default from config)")),
        )
}

fn study_dir_arg() -> Arg {
    Arg::new("study-dir")
        .long("study-dir")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Study directory (definition, config, content/)")
}

fn host_config(matches: &ArgMatches) -> Result<HostConfig> {
    let mut config = HostConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if let Some(mode) = matches.get_one::<String>("mode") {
        config.mode = mode.parse()?;
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.log_format = format.parse::<LogFormat>()?;
    }
    Ok(config)
}

fn load_bundle(args: &ArgMatches) -> Result<StudyBundle> {
    let dir = args
        .get_one::<PathBuf>("study-dir")
        .context("--study-dir is required")?;
    StudyBundle::load_dir(dir).with_context(|| format!("failed to load study from {}", dir.display()))
}

fn read_participant(path: Option<&PathBuf>) -> Result<ParticipantData> {
    let Some(path) = path else {
        return Ok(ParticipantData::new());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON object", path.display()))
}

async fn run_build(config: &HostConfig, args: &ArgMatches) -> Result<()> {
    let bundle = Arc::new(load_bundle(args)?);
    let participant = read_participant(args.get_one::<PathBuf>("participant"))?;
    let participant_id = args
        .get_one::<String>("uuid")
        .cloned()
        .or_else(|| participant.get_str("uuid").map(str::to_string))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut rng = match args.get_one::<u64>("seed") {
        Some(seed) => StdRng::seed_from_u64(*seed),
        None => StdRng::from_entropy(),
    };

    let mut host = StudyHost::new(bundle, client_for(config)?);
    if args.get_flag("strict") {
        host = host.with_policy(BuildPolicy::Strict);
    }
    if args.get_flag("confidence") {
        host = host.with_hook(Arc::new(ConfidenceRatingHook::new()));
    }
    if config.mode == Mode::Local {
        info!("local mode: allocations are not shared with other hosts");
    }

    let prepared = host.prepare(&participant_id, participant, &mut rng).await?;
    println!("{}", serde_json::to_string_pretty(&prepared)?);
    Ok(())
}

fn run_lint(args: &ArgMatches) -> Result<bool> {
    let path = args.get_one::<PathBuf>("bank").context("--bank is required")?;
    let mut bank = ContentBank::new();
    bank.merge(load_bank(path).with_context(|| format!("failed to load {}", path.display()))?)?;

    let mut rules = LintRules::with_constructs(
        args.get_many::<String>("require-construct")
            .into_iter()
            .flatten()
            .cloned(),
    );
    rules.require_explanations = args.get_flag("require-explanations");

    let report = lint_bank(&bank, &rules);
    for issue in &report.issues {
        let level = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        println!("{level}: [{}] {}", issue.source, issue.message);
    }
    println!(
        "{}: {} blocks, {} items, {} errors, {} warnings",
        path.display(),
        report.blocks,
        report.items,
        report.errors().count(),
        report.warnings().count()
    );
    Ok(report.is_clean())
}

async fn run_simulate(args: &ArgMatches) -> Result<()> {
    let config = SimulationConfig {
        participants: *args.get_one::<usize>("participants").context("--participants")?,
        item_types: args.get_many::<String>("items").into_iter().flatten().cloned().collect(),
        strata: args.get_many::<String>("strata").into_iter().flatten().cloned().collect(),
        completion_rate: *args.get_one::<f64>("completion-rate").context("--completion-rate")?,
        seed: *args.get_one::<u64>("seed").context("--seed")?,
    };
    if !(0.0..=1.0).contains(&config.completion_rate) {
        bail!("--completion-rate must be between 0 and 1");
    }

    let report = run_simulation(&config).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("max spread: {}", report.max_spread(&config.item_types));
    Ok(())
}

async fn run_serve(config: &HostConfig, args: &ArgMatches) -> Result<()> {
    let bundle = load_bundle(args)?;
    let mut state = AppState::new(bundle, client_for(config)?);
    if let Some(study_id) = &config.study_id {
        state = state.with_study_id(study_id.clone());
    }
    let bind = args
        .get_one::<String>("bind")
        .unwrap_or(&config.bind_addr);
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid listen address '{bind}'"))?;
    serve(state, addr).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = host_config(&matches)?;
    logging::init(config.log_format)?;
    info!(mode = %config.mode, version = study_cli::VERSION, "study host starting");

    match matches.subcommand() {
        Some(("build", args)) => run_build(&config, args).await,
        Some(("lint", args)) => {
            let clean = run_lint(args)?;
            std::process::exit(if clean { 0 } else { 1 });
        }
        Some(("simulate", args)) => run_simulate(args).await,
        Some(("serve", args)) => run_serve(&config, args).await,
        _ => Ok(()),
    }
}
