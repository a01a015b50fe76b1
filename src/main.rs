use clap::{crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use keyweave::build;
use keyweave::config::Config;
use std::path::Path;

fn main() {
    let matches = App::new("keyweave")
        .version(crate_version!())
        .about("Indexes blog post keywords and wires shared keywords into related-post navigation")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("index")
                .about("Scans the posts and writes the keyword index and frequency table")
                .arg(project_dir(1)),
        )
        .subcommand(
            SubCommand::with_name("annotate")
                .about("Marks shared keywords clickable and unique keywords plain in every post")
                .arg(project_dir(1)),
        )
        .subcommand(
            SubCommand::with_name("install-widget")
                .about("Writes the navigation widget and adds its script tag to every post")
                .arg(project_dir(1)),
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Runs index, annotate, and install-widget in order")
                .arg(project_dir(1)),
        )
        .subcommand(
            SubCommand::with_name("related")
                .about("Lists the posts related to a shared keyword")
                .arg(
                    Arg::with_name("KEYWORD")
                        .help("The keyword to look up")
                        .required(true)
                        .index(1),
                )
                .arg(project_dir(2)),
        )
        .get_matches();

    if let Err(message) = run(&matches) {
        eprintln!("keyweave: {}", message);
        std::process::exit(1);
    }
}

fn project_dir(index: u64) -> Arg<'static, 'static> {
    Arg::with_name("PROJECT_DIR")
        .help("The project directory (default: the current directory)")
        .index(index)
}

fn run(matches: &ArgMatches) -> Result<(), String> {
    let (command, args) = matches.subcommand();
    let args = match args {
        Some(args) => args,
        None => return Ok(()),
    };

    let dir = Path::new(args.value_of("PROJECT_DIR").unwrap_or("."));
    let config = Config::from_directory(dir).map_err(|e| e.to_string())?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_target(false)
        .init();

    let result = match command {
        "index" => build::write_index(&config).map(|_| ()),
        "annotate" => build::annotate_posts(&config).map(|_| ()),
        "install-widget" => build::install_widget(&config).map(|_| ()),
        "build" => build::build_all(&config),
        "related" => {
            // KEYWORD is required, so clap guarantees a value.
            let keyword = args.value_of("KEYWORD").unwrap_or_default();
            if let Some(overlay) = build::related(&config, keyword) {
                for link in overlay.links.iter() {
                    println!("{}\t{}", link.title, link.href);
                }
            }
            Ok(())
        }
        _ => Ok(()),
    };

    result.map_err(|e| e.to_string())
}
