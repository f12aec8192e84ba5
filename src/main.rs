//! Runs `ls -al | sort -n -k 5` in the current directory.
//!
//! The listing is written by the consumer directly to standard out, this
//! process only sets up the pipe and waits for both commands to finish.

use log::warn;
use pipes::Pipeline;

fn main() -> Result<(), pipes::Error> {
    // Enable logging.
    std_logger::Config::logfmt().init();

    let report = Pipeline::setup().build()?.run()?;

    // Like a shell we only report unsuccessful commands, the exit status of
    // this process only reflects errors in setting up the pipeline.
    for (stage, status) in report.iter() {
        if !status.success() {
            warn!("{stage} exited unsuccessfully: {status}");
        }
    }
    Ok(())
}
