use flexi_logger::{FileSpec, Logger, LoggerHandle, WriteMode};
use log::{error, info, warn};
use signal_hook::consts::{SIGHUP, SIGTERM};
use signal_hook::iterator::Signals;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use logmap::param::{self, Param};
use logmap::{cinfo, run};

fn start_logger(param: &Param) -> Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    if !param.general.log_base.is_empty() {
        Logger::try_with_str(&param.general.log_level)?
            .log_to_file(
                FileSpec::default()
                    .basename(&param.general.log_base)
                    .suffix(&param.general.log_suffix),
            )
            .write_mode(WriteMode::BufferAndFlush)
            .format_for_files(flexi_logger::detailed_format)
            .start()
    } else {
        Logger::try_with_str(&param.general.log_level)?
            .log_to_stdout()
            .write_mode(WriteMode::Direct)
            .format_for_stdout(flexi_logger::default_format)
            .start()
    }
}

fn main() {
    let param_file = std::env::args().nth(1).unwrap_or_else(|| "param.yaml".to_string());
    let param = match param::get(param_file.clone()) {
        Ok(param) => param,
        Err(e) => {
            eprintln!("Unable to load parameters from {}: {}", param_file, e);
            std::process::exit(1);
        }
    };

    // Handle kept alive until the end of main so that buffered lines are flushed
    let _logger = match start_logger(&param) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Unable to start logger: {}", e);
            std::process::exit(1);
        }
    };

    info!("logmap {} | parameters from {}", logmap::version(), param_file);

    let running = Arc::new(AtomicBool::new(true));
    match Signals::new([SIGTERM, SIGHUP]) {
        Ok(mut signals) => {
            let r = Arc::clone(&running);
            thread::spawn(move || {
                for sig in signals.forever() {
                    warn!("Received signal {}, stopping after the current analysis...", sig);
                    r.store(false, Ordering::Relaxed);
                }
            });
        }
        Err(e) => warn!("Unable to register signal handlers: {}", e),
    }

    let exp = match run(&param, Arc::clone(&running)) {
        Ok(exp) => exp,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    cinfo!(param.general.display_colorful, "{}", exp.display_results());

    if !param.general.export_dir.is_empty() {
        match exp.export_tsv(&param.general.export_dir) {
            Ok(paths) => info!("{} TSV files written in {}", paths.len(), param.general.export_dir),
            Err(e) => error!("TSV export failed: {}", e),
        }
    }

    if !param.general.save_exp.is_empty() {
        match exp.save_auto(&param.general.save_exp) {
            Ok(()) => info!("Experiment saved to {}", param.general.save_exp),
            Err(e) => error!("Unable to save experiment: {}", e),
        }
    }
}
