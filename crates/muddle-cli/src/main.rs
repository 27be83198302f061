mod description;

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use muddle::{Builder, DirType};
use muddle_config::{Config, ConsoleReporter, Reporter};
use muddle_domain::display_domain;
use muddle_errors::{MuddleError, classify, give_up};
use muddle_label::{Label, LabelType};
use muddle_rules::Rule;
use muddle_scheduler::BuildReport;
use muddle_stamp::{CheckoutSection, DomainSection, RootSection, Stamp, diff_stamps};

use description::EmptyDescription;

#[derive(Parser, Debug)]
#[command(name = "muddle", version)]
#[command(about = "Polyrepo, multi-component build and deployment orchestrator")]
struct Cli {
    /// Build tree root (defaults to the current directory).
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Print what the command would do without doing it.
    #[arg(short = 'n', long = "just-print", global = true)]
    just_print: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the `.muddle` control directory for a fresh build tree.
    Init,
    /// `init`, then load the registered build description.
    Bootstrap,
    /// Inspect the build tree's labels, rules and layout.
    Query {
        #[command(subcommand)]
        query: QueryCommand,
    },
    /// Build a label, or every default target if none is given.
    Build { label: Option<String> },
    /// Clear a label's tag and rebuild it.
    Rebuild { label: Option<String> },
    /// Clear a package's `configured` tag and rebuild from there.
    Reconfigure { label: String },
    /// Deploy a label, or every default deployment if none is given.
    Deploy { label: Option<String> },
    /// Clear a deployment's tag and redeploy it.
    Redeploy { label: Option<String> },
    /// Clear a package's built state back to `clean`.
    Clean { label: String },
    /// Clear a package's built state back to `distclean`.
    Distclean { label: String },
    /// Print the environment a build step against `label` would see.
    Env { label: String },
    /// Save, inspect or transfer version stamps.
    Stamp {
        #[command(subcommand)]
        stamp: StampCommand,
    },
    /// Forget a saved stamp's recorded revisions (clears `problems`
    /// tracking is not persisted; this only removes the stamp file).
    Unstamp { file: PathBuf },
    /// Declare that `source` additionally depends on `target`.
    Depend { source: String, target: String },
    /// Report what the current directory resolves to in this tree.
    Whereami,

    /// Commit a checkout's local changes. Needs a registered `VcsPlugin`.
    Commit { checkout: String, message: String },
    /// Push a checkout's commits upstream. Needs a registered `VcsPlugin`.
    Push { checkout: String },
    /// Pull a checkout from upstream. Needs a registered `VcsPlugin`.
    Pull { checkout: String },
    /// Merge a revision into a checkout. Needs a registered `VcsPlugin`.
    Merge { checkout: String, from_revision: String },
    /// Report a checkout's VCS status. Needs a registered `VcsPlugin`.
    Status { checkout: String },
    /// Repoint a checkout at a different upstream. Needs a registered `VcsPlugin`.
    Reparent { checkout: String, new_repo_url: String },
    /// Materialise a checkout on disk. Needs a registered `VcsPlugin`.
    Checkout { checkout: String },
    /// Remove a checkout's working copy. Needs a registered `VcsPlugin`.
    Uncheckout { checkout: String },
    /// Bring an externally-created tree under VCS control. Needs a registered `VcsPlugin`.
    Import { label: String, at: PathBuf },
}

#[derive(Subcommand, Debug)]
enum QueryCommand {
    Checkouts,
    Packages,
    Deployments,
    Roles,
    Deps { label: String },
    Rules,
    Unused,
    Root,
}

#[derive(Subcommand, Debug)]
enum StampCommand {
    /// Save the current tree's checkout revisions to a stamp file.
    Save { file: PathBuf },
    /// Print the stamp the current tree would save, without saving it.
    Version,
    /// Diff two saved stamp files.
    Diff { from: PathBuf, to: PathBuf },
    /// Push a stamp file to the configured versions repository. Needs a registered `VcsPlugin`.
    Push { file: PathBuf },
    /// Pull a stamp file from the configured versions repository. Needs a registered `VcsPlugin`.
    Pull { file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            match classify(&err) {
                Some(MuddleError::Bug { .. }) | None => eprintln!("{err:?}"),
                Some(_) => eprintln!("{err:#}"),
            }
            let code = classify(&err).map(MuddleError::exit_code).unwrap_or(2);
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let config = Config::load(&cli.root).with_context(|| format!("loading config at {}", cli.root.display()))?;
    let reporter = ConsoleReporter;

    match cli.cmd {
        Commands::Init => {
            run_init(&cli.root, &config, cli.just_print)?;
            Ok(0)
        }
        Commands::Bootstrap => {
            run_init(&cli.root, &config, cli.just_print)?;
            if cli.just_print {
                reporter.info("[dry-run] would load the build description");
                return Ok(0);
            }
            let mut builder = open_builder(&cli.root, config)?;
            builder.load_description(&EmptyDescription)?;
            reporter.info(&format!(
                "loaded description: {} checkouts, {} rules",
                builder.checkouts().len(),
                builder.rules().len()
            ));
            Ok(0)
        }
        Commands::Query { query } => run_query(&cli.root, config, query),
        Commands::Build { label } => run_build(&cli.root, config, label, false, cli.just_print, &reporter),
        Commands::Rebuild { label } => run_build(&cli.root, config, label, true, cli.just_print, &reporter),
        Commands::Reconfigure { label } => {
            let target = parse_label(&label)?.with_tag_copy("configured");
            run_single_build(&cli.root, config, &target, true, cli.just_print, &reporter)
        }
        Commands::Deploy { label } => run_build(&cli.root, config, label, false, cli.just_print, &reporter),
        Commands::Redeploy { label } => run_build(&cli.root, config, label, true, cli.just_print, &reporter),
        Commands::Clean { label } => {
            let target = package_label(&label)?.with_tag_copy("clean");
            run_single_build(&cli.root, config, &target, false, cli.just_print, &reporter)
        }
        Commands::Distclean { label } => {
            let target = package_label(&label)?.with_tag_copy("distclean");
            run_single_build(&cli.root, config, &target, false, cli.just_print, &reporter)
        }
        Commands::Env { label } => run_env(&cli.root, config, &label),
        Commands::Stamp { stamp } => run_stamp(&cli.root, config, stamp, cli.just_print, &reporter),
        Commands::Unstamp { file } => {
            if cli.just_print {
                reporter.info(&format!("[dry-run] would unstamp {}", file.display()));
                return Ok(0);
            }
            give_up!("unstamp needs a registered VcsPlugin to recreate checkouts; none is wired into this CLI")
        }
        Commands::Depend { source, target } => {
            let source_label = parse_label(&source)?;
            let target_label = parse_label(&target)?;
            if cli.just_print {
                reporter.info(&format!("[dry-run] would make {source_label} depend on {target_label}"));
                return Ok(0);
            }
            let mut builder = open_builder(&cli.root, config)?;
            builder.load_description(&EmptyDescription)?;
            builder.add_rule(Rule::gather(source_label.clone(), [target_label.clone()].into()));
            reporter.info(&format!("{source_label} now depends on {target_label}"));
            Ok(0)
        }
        Commands::Whereami => {
            let mut builder = open_builder(&cli.root, config)?;
            builder.load_description(&EmptyDescription)?;
            let cwd = std::env::current_dir().context("reading current directory")?;
            let location = builder.find_location_in_tree(&cwd);
            print_location(&location);
            Ok(0)
        }
        Commands::Commit { .. }
        | Commands::Push { .. }
        | Commands::Pull { .. }
        | Commands::Merge { .. }
        | Commands::Status { .. }
        | Commands::Reparent { .. }
        | Commands::Checkout { .. }
        | Commands::Uncheckout { .. }
        | Commands::Import { .. } => {
            if cli.just_print {
                reporter.info("[dry-run] would delegate to the registered VcsPlugin");
                return Ok(0);
            }
            give_up!("this verb needs a registered VcsPlugin; none is wired into this CLI")
        }
    }
}

fn open_builder(root: &std::path::Path, config: Config) -> Result<Builder> {
    Ok(Builder::new(root.to_path_buf(), config))
}

fn run_init(root: &std::path::Path, config: &Config, just_print: bool) -> Result<()> {
    let muddle_dir = root.join(".muddle");
    if just_print {
        println!("[dry-run] would create {}", muddle_dir.display());
        return Ok(());
    }
    fs::create_dir_all(&muddle_dir).with_context(|| format!("creating {}", muddle_dir.display()))?;
    let config_path = Config::config_path(root);
    if !config_path.exists() {
        let text = toml::to_string_pretty(config).context("serialising default config")?;
        fs::write(&config_path, text).with_context(|| format!("writing {}", config_path.display()))?;
    }
    println!("initialised {}", root.display());
    Ok(())
}

fn run_query(root: &std::path::Path, config: Config, query: QueryCommand) -> Result<u8> {
    let mut builder = open_builder(root, config)?;
    builder.load_description(&EmptyDescription)?;

    match query {
        QueryCommand::Checkouts => {
            for label in builder.checkouts().keys() {
                println!("{label}");
            }
        }
        QueryCommand::Packages => print_targets_of_type(&builder, LabelType::Package),
        QueryCommand::Deployments => print_targets_of_type(&builder, LabelType::Deployment),
        QueryCommand::Roles => {
            let mut roles = BTreeSet::new();
            for rule in builder.rules().iter() {
                if let Some(role) = rule.target.role.as_ref().and_then(|r| r.as_str()) {
                    roles.insert(role.to_string());
                }
            }
            for role in roles {
                println!("{role}");
            }
        }
        QueryCommand::Deps { label } => {
            let target = parse_label(&label)?;
            let chain = builder.rules().needed_to_build(&target, true)?;
            for label in chain {
                println!("{label}");
            }
        }
        QueryCommand::Rules => {
            for rule in builder.rules().iter() {
                let deps = rule.deps.iter().map(Label::to_string).collect::<Vec<_>>().join(", ");
                println!("{} <- [{}]", rule.target, deps);
            }
        }
        QueryCommand::Unused => {
            for label in builder.rules().unused_labels(&builder.default_targets()) {
                println!("{label}");
            }
        }
        QueryCommand::Root => {
            println!("{}", builder.root().display());
            if let Some(domain) = builder.domain() {
                println!("domain: {}", display_domain(domain));
            }
        }
    }
    Ok(0)
}

fn run_build(
    root: &std::path::Path,
    config: Config,
    label: Option<String>,
    kill_first: bool,
    just_print: bool,
    reporter: &ConsoleReporter,
) -> Result<u8> {
    let mut builder = open_builder(root, config)?;
    builder.load_description(&EmptyDescription)?;

    let targets = match label {
        Some(text) => vec![parse_label(&text)?],
        None => builder.default_targets(),
    };
    if targets.is_empty() {
        give_up!("no label given and no default targets configured (see default_roles/default_deployments)");
    }

    if just_print {
        for target in &targets {
            reporter.info(&format!("[dry-run] would build {target}"));
        }
        return Ok(0);
    }

    let mut clean = true;
    for target in &targets {
        if kill_first {
            builder.kill_label(target)?;
        }
        let report = builder.build_label(target, false)?;
        print_report(&report);
        clean &= report.is_clean();
    }
    Ok(if clean { 0 } else { 1 })
}

fn run_single_build(
    root: &std::path::Path,
    config: Config,
    target: &Label,
    kill_first: bool,
    just_print: bool,
    reporter: &ConsoleReporter,
) -> Result<u8> {
    let mut builder = open_builder(root, config)?;
    builder.load_description(&EmptyDescription)?;

    if just_print {
        reporter.info(&format!("[dry-run] would build {target}"));
        return Ok(0);
    }

    if kill_first {
        builder.kill_label(target)?;
    }
    let report = builder.build_label(target, false)?;
    print_report(&report);
    Ok(if report.is_clean() { 0 } else { 1 })
}

fn run_env(root: &std::path::Path, config: Config, label: &str) -> Result<u8> {
    let target = parse_label(label)?;
    let mut builder = open_builder(root, config)?;
    builder.load_description(&EmptyDescription)?;

    println!("MUDDLE_ROOT={}", builder.root().display());
    println!("MUDDLE_LABEL={target}");
    if let Some(domain) = target.domain.as_deref() {
        println!("MUDDLE_DOMAIN={}", display_domain(domain));
    }
    if let Some(data) = builder.checkouts().get(&target.with_tag_copy("*")) {
        println!("MUDDLE_CHECKOUT_LOCATION={}", data.location().display());
    }
    Ok(0)
}

fn run_stamp(
    root: &std::path::Path,
    config: Config,
    stamp: StampCommand,
    just_print: bool,
    reporter: &ConsoleReporter,
) -> Result<u8> {
    match stamp {
        StampCommand::Save { file } => {
            if just_print {
                reporter.info(&format!("[dry-run] would save a stamp to {}", file.display()));
                return Ok(0);
            }
            let mut builder = open_builder(root, config)?;
            builder.load_description(&EmptyDescription)?;
            let stamp = build_stamp(&builder);
            if stamp.is_partial() {
                for problem in &stamp.problems {
                    reporter.warn(problem);
                }
            }
            fs::write(&file, stamp.render()).with_context(|| format!("writing {}", file.display()))?;
            println!("{}", stamp.sha1_hex());
            Ok(0)
        }
        StampCommand::Version => {
            let mut builder = open_builder(root, config)?;
            builder.load_description(&EmptyDescription)?;
            let stamp = build_stamp(&builder);
            println!("{}", stamp.file_name());
            Ok(0)
        }
        StampCommand::Diff { from, to } => {
            let from_stamp =
                Stamp::parse(&fs::read_to_string(&from).with_context(|| format!("reading {}", from.display()))?)?;
            let to_stamp =
                Stamp::parse(&fs::read_to_string(&to).with_context(|| format!("reading {}", to.display()))?)?;
            print!("{}", diff_stamps(&from_stamp, &to_stamp, config.stamp_format));
            Ok(0)
        }
        StampCommand::Push { file } | StampCommand::Pull { file } => {
            if just_print {
                reporter.info(&format!("[dry-run] would transfer {}", file.display()));
                return Ok(0);
            }
            give_up!("stamp push/pull need a registered VcsPlugin to reach the versions repository")
        }
    }
}

/// Build the stamp the current tree would save. No `VcsPlugin` is
/// registered in this CLI, so no checkout's revision can be resolved —
/// every one is recorded as a problem, yielding a partial stamp. A
/// product-specific embedder with a real `VcsPlugin` would resolve each
/// checkout's actual revision here instead.
fn build_stamp(builder: &Builder) -> Stamp {
    let root_section = RootSection {
        repo_url: String::new(),
        description_path: String::new(),
        description_branch: None,
    };

    let mut problems = Vec::new();
    let mut checkouts = Vec::new();
    for data in builder.checkouts().values() {
        problems.push(format!("no resolvable revision for {}: no VcsPlugin registered", data.name()));
        checkouts.push(CheckoutSection::from_checkout_data(data, String::new()));
    }

    let domains: Vec<DomainSection> = Vec::new();
    Stamp::new(root_section, domains, checkouts, problems)
}

fn print_targets_of_type(builder: &Builder, label_type: LabelType) {
    let mut seen = BTreeSet::new();
    for rule in builder.rules().iter() {
        if rule.target.label_type == label_type {
            seen.insert(rule.target.clone());
        }
    }
    for label in seen {
        println!("{label}");
    }
}

fn print_report(report: &BuildReport) {
    for label in &report.completed {
        println!("built: {label}");
    }
    for (label, message) in &report.gave_up {
        eprintln!("gave up: {label}: {message}");
    }
    for (label, message) in &report.unsupported {
        println!("unsupported: {label}: {message}");
    }
}

fn print_location(location: &muddle::Location) {
    let kind = match location.dir_type {
        DirType::Root => "root",
        DirType::Checkout => "checkout",
        DirType::PackageObject => "package object",
        DirType::Install => "install",
        DirType::Deploy => "deploy",
        DirType::SubdomainRoot => "subdomain root",
        DirType::Muddle => "control directory",
        DirType::Versions => "versions checkout",
        DirType::Unexpected => "outside the build tree",
    };
    println!("{kind}");
    if let Some(label) = &location.label {
        println!("label: {label}");
    }
    if let Some(domain) = &location.domain {
        println!("domain: {}", display_domain(domain));
    }
}

fn parse_label(text: &str) -> Result<Label> {
    Label::parse(text).map_err(|err| anyhow::anyhow!(err)).with_context(|| format!("invalid label {text:?}"))
}

/// A bare package name, defaulted to the `built` tag; most package
/// verbs only care about identifying the package, and `with_tag_copy`
/// overrides the tag they actually act on.
fn package_label(name: &str) -> Result<Label> {
    if name.contains(':') {
        return parse_label(name);
    }
    Ok(Label::new(LabelType::Package, name, "built"))
}
