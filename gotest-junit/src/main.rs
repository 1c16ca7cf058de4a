// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use gotest_junit::{GotestJunitApp, GotestJunitExitCode, OutputWriter};

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let opts = match GotestJunitApp::try_parse() {
        Ok(opts) => opts,
        Err(error) => {
            // Help and version output go to stdout and aren't failures.
            let code = if error.use_stderr() {
                GotestJunitExitCode::SETUP_ERROR
            } else {
                GotestJunitExitCode::OK
            };
            let _ = error.print();
            std::process::exit(code)
        }
    };
    let output = opts.init_output();

    match opts.exec(&mut OutputWriter::default()) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}
