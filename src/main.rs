use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;

use phoenix::{
    Args, OutputFormat, RunSettings, fake_hardware_client, real_hardware_client,
    run_with_settings,
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let mut stdout = std::io::stdout();

    let run_result = async {
        let default_format = if stdout.is_terminal() {
            OutputFormat::Pretty
        } else {
            OutputFormat::Json
        };
        let settings = RunSettings::from_args(&args, default_format);
        let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
        let hardware_client = match maybe_fake_args {
            Some(fake_args) => fake_hardware_client(fake_args),
            None => real_hardware_client(),
        };

        run_with_settings(command, &mut stdout, hardware_client, &settings).await
    }
    .await;

    match run_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
