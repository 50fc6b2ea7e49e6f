// use log macros.
#[macro_use]
extern crate log as _log;

fn main() {
    pyre_log::init_log(pyre_log::LogConfig::default()).expect("failed to init logger");

    trace!("trace!");
    debug!("debug!");
    info!("info!");
    warn!("warn!");
    error!("error!");
}
