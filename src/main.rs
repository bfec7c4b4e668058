/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use anyhow::{Context, Result};
use cicoder::file_reader::{CompiledUnitFileReader, FileReader};
use cicoder::CompiledUnit;
use clap::Parser as clap_parser;
use std::fs;
use std::path::PathBuf;

#[derive(clap_parser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    /// Path to the JSON-encoded compiled unit (program + symbol environment)
    input: PathBuf,

    #[clap(short, long)]
    output: PathBuf,

    /// Include search path, accepted for front-end compatibility; the code
    /// generator itself never follows includes.
    #[clap(short = 'I', long = "include", action = clap::ArgAction::Append)]
    include: Vec<PathBuf>,

    /// Print the lexer's token stream instead of generating code.
    #[clap(long)]
    tokens: bool,

    /// Pretty-print the deserialized AST instead of generating code.
    #[clap(long)]
    ast: bool,
}

fn main() -> Result<()> {
    let opts: Opts = Opts::parse();

    if opts.tokens {
        anyhow::bail!("--tokens is not implemented: tokenizing is a front-end concern this crate does not perform");
    }

    let reader = CompiledUnitFileReader;
    let source = reader
        .read_to_string(&opts.input)
        .with_context(|| format!("failed to read input file: {}", opts.input.display()))?;

    let unit: CompiledUnit = serde_json::from_str(&source)
        .with_context(|| format!("failed to parse compiled unit: {}", opts.input.display()))?;

    if opts.ast {
        println!("{:#?}", unit.program);
        return Ok(());
    }

    let asm = cicoder::generate(&unit)
        .with_context(|| format!("failed to generate code for {}", opts.input.display()))?;

    fs::write(&opts.output, asm)
        .with_context(|| format!("failed to write output file: {}", opts.output.display()))?;

    println!(
        "Successfully generated {} from {}",
        opts.output.display(),
        opts.input.display()
    );

    Ok(())
}
