use crate::AppError::ConfigError;
use clap::Parser;
use config::{CommandLine, Config};
use lutescribe::{
    transcribe_file, BeamClassifier, KeySignature, Mode, NotationType,
    ProcessBeamClassifier, ProcessSpeller, ReferenceBeamClassifier, ReferenceSpeller, Settings,
    Speller, StaffStyle, TranscribeError, Transcriber, Tuning,
};
use std::io;
use std::path::PathBuf;

mod config;

/// Used when neither the command line nor the local configuration name one
const DEFAULT_OUTPUT_FOLDER: &str = "out";

fn main() {
    let result = main_result();
    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            // use Display instead of Debug for user friendly error messages
            log::error!("{err}");
            1
        }
    });
}

pub fn main_result() -> Result<(), AppError> {
    // setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("lutescribe=info"))
        .init();

    // args
    let mut args = CliArgs::parse();

    // check input files exist
    for file in &args.files {
        if !file.exists() {
            let err = ConfigError(format!("Input file not found {file:?}"));
            return Err(err);
        }
    }

    // read local config
    let mut local_config = Config::read_config()?;
    if args.save_config {
        local_config.update(
            args.output_dir.clone(),
            args.speller_command.clone().map(CommandLine::Line),
            args.beamer_command.clone().map(CommandLine::Line),
        )?;
    }
    let output_dir = args
        .output_dir
        .take()
        .or_else(|| local_config.get_output_folder())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FOLDER));

    // external collaborators, in-process ones unless configured
    let speller_command = args.speller_command.take().map(CommandLine::Line);
    let mut speller: Box<dyn Speller> =
        match speller_command.or_else(|| local_config.get_speller_command()) {
            Some(command) => {
                log::info!("Spelling pitches with '{command}'");
                Box::new(ProcessSpeller::new(parse_command(&command)?))
            }
            None => Box::new(ReferenceSpeller),
        };
    let beamer_command = args.beamer_command.take().map(CommandLine::Line);
    let mut classifier: Box<dyn BeamClassifier> =
        match beamer_command.or_else(|| local_config.get_beamer_command()) {
            Some(command) => {
                log::info!("Beaming with '{command}'");
                Box::new(ProcessBeamClassifier::new(parse_command(&command)?))
            }
            None => Box::new(ReferenceBeamClassifier),
        };

    let settings = args.settings()?;
    log::debug!("Transcribing with {settings:?}");
    let mut transcriber = Transcriber::new(settings, speller.as_mut(), classifier.as_mut());

    // go!
    for file in &args.files {
        transcribe_file(file, &output_dir, &mut transcriber)?;
    }
    Ok(())
}

fn parse_command(command: &CommandLine) -> Result<Vec<String>, AppError> {
    let parts = command.args();
    if parts.is_empty() {
        return Err(ConfigError("Empty external command".to_string()));
    }
    Ok(parts)
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// MEI files holding lute tablature.
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Lute tuning: F, F-, G, G-, A or A- (a trailing '-' lowers the sixth course).
    #[arg(long, default_value = "G")]
    tuning: Tuning,
    /// Key signature as a number of accidentals, negative for flats.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true,
          value_parser = clap::value_parser!(i8).range(-5..=5))]
    key: i8,
    /// Mode of the key signature: major or minor.
    #[arg(long, default_value = "major")]
    mode: Mode,
    /// Notehead staves: single (treble an octave lower) or double (treble and bass).
    #[arg(long, default_value = "single")]
    staff: StaffStyle,
    /// Drop the tablature staff from the transcription.
    #[arg(long, default_value_t = false)]
    no_tab: bool,
    /// Tablature type of the retained staff: FLT, ILT, SLT or GLT.
    #[arg(long, default_value = "FLT")]
    tab_type: NotationType,
    /// Do not group short notes into beams.
    #[arg(long, default_value_t = false)]
    no_beams: bool,
    /// Folder receiving the transcriptions.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// External pitch spelling command, one JSON request per line on stdin.
    /// Split on whitespace; arguments holding spaces need the JSON array form
    /// in the local configuration.
    #[arg(long)]
    speller_command: Option<String>,
    /// External beam classifier command, one JSON request per line on stdin.
    /// Split on whitespace like --speller-command.
    #[arg(long)]
    beamer_command: Option<String>,
    /// Remember the output folder and external commands as defaults.
    #[arg(long, default_value_t = false)]
    save_config: bool,
}

impl CliArgs {
    fn settings(&self) -> Result<Settings, AppError> {
        Ok(Settings {
            tuning: self.tuning,
            key: KeySignature::new(self.key, self.mode).map_err(ConfigError)?,
            staff: self.staff,
            keep_tab: !self.no_tab,
            notation: self.tab_type,
            beams: !self.no_beams,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("transcription error: {0}")]
    TranscriptionError(TranscribeError),
    #[error("other error: {0}")]
    OtherError(String),
}

impl From<TranscribeError> for AppError {
    fn from(error: TranscribeError) -> Self {
        match error {
            TranscribeError::ConfigError(s) => Self::ConfigError(s),
            TranscribeError::IoError(s) => Self::OtherError(s),
            other => Self::TranscriptionError(other),
        }
    }
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        Self::OtherError(error.to_string())
    }
}
