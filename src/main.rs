// Copyright 2020 Google LLC
//
// Use of this source code is governed by an MIT-style license that can be found
// in the LICENSE file or at https://opensource.org/licenses/MIT.

mod opts;

use std::io::Write as _;
use std::path::PathBuf;

use log::{error, info, trace};
use rrg_finder::action::finder;
use rrg_finder::action::finder::hash::hex;
use rrg_finder::session::{self, Blob, Session};

use opts::Opts;

fn main() {
    let opts = opts::from_args();
    init_log(&opts);

    let request = match opts.request() {
        Ok(request) => request,
        Err(error) => {
            error!("invalid request: {}", error);
            std::process::exit(2);
        }
    };

    if let Some(ref dir) = opts.download_dir {
        if let Err(error) = std::fs::create_dir_all(dir) {
            error!("failed to create '{}': {}", dir.display(), error);
            std::process::exit(2);
        }
    }

    let mut session = Cli::new(opts.download_dir.clone());
    if let Err(error) = finder::handle(&mut session, request) {
        error!("file finder failed: {}", error);
        std::process::exit(1);
    }

    info!("{} blobs uploaded", session.uploaded);
}

fn init_log(opts: &Opts) {
    let level = opts.verbosity;

    let mut loggers = Vec::<Box<dyn simplelog::SharedLogger>>::new();

    let config = Default::default();
    if let Some(logger) = simplelog::TermLogger::new(level, config, simplelog::TerminalMode::Stderr) {
        loggers.push(logger);
    }

    if let Some(ref path) = opts.log_to_file {
        match std::fs::File::create(path) {
            Ok(file) => {
                let config = Default::default();
                loggers.push(simplelog::WriteLogger::new(level, config, file));
            }
            Err(error) => {
                eprintln!("failed to create log file '{}': {}", path.display(), error);
            }
        }
    }

    if let Err(error) = simplelog::CombinedLogger::init(loggers) {
        eprintln!("failed to initialize logging: {}", error);
    }
}

/// Session printing results to the standard output and storing blobs as
/// files named after their digest.
struct Cli {
    download_dir: Option<PathBuf>,
    uploaded: usize,
}

impl Cli {

    fn new(download_dir: Option<PathBuf>) -> Cli {
        Cli {
            download_dir,
            uploaded: 0,
        }
    }
}

impl Session for Cli {

    fn reply<R: session::Response>(&mut self, response: R) -> session::Result<()> {
        writeln!(std::io::stdout(), "{}", response)?;
        Ok(())
    }

    fn upload(&mut self, blob: Blob) -> session::Result<()> {
        if let Some(ref dir) = self.download_dir {
            std::fs::write(dir.join(hex(&blob.digest)), &blob.data)?;
        }

        self.uploaded += 1;
        Ok(())
    }

    fn heartbeat(&mut self) -> session::Result<()> {
        trace!("heartbeat");
        Ok(())
    }
}
