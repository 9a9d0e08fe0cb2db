// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

use anyhow::Result;
use clap::Parser;
use mka::cli::{Mka, SubCommand};
use mka::logging::init_log;
use mka::utils::print_error_chain;
use mka::{control, pipeline, prompt};
use std::process::ExitCode;

fn inner_main() -> Result<ExitCode> {
    let opts = Mka::parse();
    init_log(opts.verbose);

    match opts.subcmd {
        SubCommand::New(args) => {
            let req = args.to_request()?;
            let mut prompter = prompt::terminal();
            control::create_analysis(&req, &mut prompter)?;
        }
        SubCommand::Pipeline(args) => {
            let config = args.to_config()?;
            let libraries = args.read_libraries()?;
            pipeline::write_pipeline(&config, &libraries)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    match inner_main() {
        Ok(exit_code) => exit_code,
        Err(err) => {
            print_error_chain(&err);
            ExitCode::FAILURE
        }
    }
}
