#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
use std::process::exit;

use bcdemux_lib::opts::setup;
use bcdemux_lib::run::run;
use log::{error, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(not(tarpaulin_include))]
fn main() {
    let opts = setup();

    match opts.validate().map_err(anyhow::Error::from).and_then(run) {
        Ok(report) if report.all_succeeded() => (),
        Ok(report) => {
            warn!("Unsuccessful splits: {}", report.unsuccessful_units().join(", "));
            exit(2);
        }
        Err(err) => {
            error!("{:#}", err);
            exit(1);
        }
    }
}
