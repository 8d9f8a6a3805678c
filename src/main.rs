use std::{error::Error as _, ffi::OsString, path::PathBuf, process::ExitCode};

use clap::{ArgGroup, CommandFactory, Parser, ValueEnum};
use serde::Serialize;

use mapphoto::{
    map,
    registration::{self, Action, Elevation},
    Geotag, MapService, PropertySystem,
};

const EXIT_OK: u8 = 0;
const EXIT_USAGE: u8 = 1;
const EXIT_NOT_GEOTAGGED: u8 = 2;
const EXIT_ERROR: u8 = 3;

/// Open a web map at the place a photo was taken
#[derive(Parser, Debug)]
#[command(version, about)]
#[command(group(ArgGroup::new("printed").args(["dump", "no_launch"]).multiple(true)))]
struct Cli {
    /// Photo to map
    file: Option<PathBuf>,
    /// Add "Map Photo" to the Explorer context menu of .jpg/.jpeg files
    #[arg(long, conflicts_with_all = ["unregister", "file"])]
    register: bool,
    /// Remove "Map Photo" from the Explorer context menu
    #[arg(long, conflicts_with = "file")]
    unregister: bool,
    #[arg(long, hide = true, value_enum, conflicts_with_all = ["register", "unregister", "file"])]
    elevated: Option<ElevatedAction>,
    /// List every metadata property of the photo instead of mapping it
    #[arg(long, action)]
    dump: bool,
    /// Print the map URL instead of opening it
    #[arg(long, action)]
    no_launch: bool,
    /// Print JSON (with --dump or --no-launch)
    #[arg(long, action, requires = "printed")]
    json: bool,
    /// Host of the map service
    #[arg(long, env = "MAPPHOTO_MAP_HOST", default_value = map::DEFAULT_MAP_HOST)]
    map_host: String,
    #[arg(short, long, action)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ElevatedAction {
    Register,
    Unregister,
}

impl From<ElevatedAction> for Action {
    fn from(action: ElevatedAction) -> Self {
        match action {
            ElevatedAction::Register => Action::Register,
            ElevatedAction::Unregister => Action::Unregister,
        }
    }
}

#[derive(Serialize)]
struct MapOutput<'a> {
    #[serde(flatten)]
    geotag: &'a Geotag,
    url: &'a str,
}

/// Rewrites the Windows style `-register` and `/register` (any case) to the
/// long flags clap knows.
fn normalize_args<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 {
                return arg;
            }
            match arg.to_str().map(str::to_ascii_lowercase).as_deref() {
                Some("-register" | "/register" | "--register") => "--register".into(),
                Some("-unregister" | "/unregister" | "--unregister") => "--unregister".into(),
                _ => arg,
            }
        })
        .collect()
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run(args: Cli) -> mapphoto::Result<u8> {
    if let Some(action) = args.elevated {
        let action = Action::from(action);
        registration::perform(action)?;
        eprintln!("Map Photo: {} done", action);
        return Ok(EXIT_OK);
    }

    let action = if args.register {
        Some(Action::Register)
    } else if args.unregister {
        Some(Action::Unregister)
    } else {
        None
    };
    if let Some(action) = action {
        match registration::run(action)? {
            Elevation::Done | Elevation::Relaunched => eprintln!("Map Photo: {} done", action),
            // Declining the prompt is the user's answer, not a failure.
            Elevation::Refused => {}
        }
        return Ok(EXIT_OK);
    }

    let path = match args.file {
        Some(path) => path,
        None => {
            eprintln!("No file name specified.");
            eprintln!("{}", Cli::command().render_usage());
            return Ok(EXIT_USAGE);
        }
    };

    if args.dump {
        let entries = mapphoto::dump_properties(&path, &PropertySystem::new())?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            for entry in entries.iter() {
                println!("{}: {}", entry.name, entry.value);
            }
        }
        return Ok(EXIT_OK);
    }

    let keys = PropertySystem::new().gps_keys()?;
    let geotag = match mapphoto::geotag_for_path(&path, &keys)? {
        Some(geotag) => geotag,
        None => {
            eprintln!("Photo is not geotagged. Cannot map its location.");
            return Ok(EXIT_NOT_GEOTAGGED);
        }
    };
    log::debug!("{}: {}, {}", path.display(), geotag.latitude, geotag.longitude);

    let url = MapService::new(&args.map_host).url_for(&geotag);
    if args.no_launch {
        if args.json {
            let output = MapOutput {
                geotag: &geotag,
                url: &url,
            };
            println!("{}", serde_json::to_string(&output)?);
        } else {
            println!("{}", url);
        }
    } else {
        map::launch(&url)?;
    }
    Ok(EXIT_OK)
}

fn main() -> ExitCode {
    let args = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() { EXIT_USAGE } else { EXIT_OK });
        }
    };
    init_logger(args.verbose);
    let elevated = args.elevated.is_some();

    match run(args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            log::debug!("{:?}", e);
            eprintln!("mapphoto: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            if elevated {
                // The elevated child owns a console that closes on exit.
                eprintln!("Press Enter to close.");
                let _ = std::io::stdin().read_line(&mut String::new());
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}
