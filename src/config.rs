use std::{
    fmt,
    fs::{create_dir_all, File},
    io::{BufReader, Write},
    path::PathBuf,
};

use home::home_dir;
use lutescribe::{split_command, TranscribeError};
use serde::{Deserialize, Serialize};

/// External command: a single line split on whitespace, or an explicit
/// argument list for arguments holding spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Line(String),
    Args(Vec<String>),
}

impl CommandLine {
    pub fn args(&self) -> Vec<String> {
        match self {
            CommandLine::Line(line) => split_command(line),
            CommandLine::Args(args) => args.clone(),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommandLine::Line(line) => write!(f, "{line}"),
            CommandLine::Args(args) => write!(f, "{}", args.join(" ")),
        }
    }
}

/// Local defaults, overridden by command line flags.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    output_folder: Option<PathBuf>,
    speller_command: Option<CommandLine>,
    beamer_command: Option<CommandLine>,
}

impl Config {
    // folder placed in $HOME directory
    const FOLDER: &'static str = ".lutescribe";

    pub fn get_output_folder(&self) -> Option<PathBuf> {
        self.output_folder.clone()
    }

    pub fn get_speller_command(&self) -> Option<CommandLine> {
        self.speller_command.clone()
    }

    pub fn get_beamer_command(&self) -> Option<CommandLine> {
        self.beamer_command.clone()
    }

    /// Remember the given values, keeping the current ones where `None`.
    pub fn update(
        &mut self,
        output_folder: Option<PathBuf>,
        speller_command: Option<CommandLine>,
        beamer_command: Option<CommandLine>,
    ) -> Result<(), TranscribeError> {
        let updated = Self {
            output_folder: output_folder.or_else(|| self.output_folder.clone()),
            speller_command: speller_command.or_else(|| self.speller_command.clone()),
            beamer_command: beamer_command.or_else(|| self.beamer_command.clone()),
        };
        if *self == updated {
            // no op
            Ok(())
        } else {
            *self = updated;
            self.save_config()
        }
    }

    fn get_base_path() -> Result<PathBuf, TranscribeError> {
        let home = home_dir().ok_or_else(|| {
            TranscribeError::ConfigError("Could not find home directory".to_string())
        })?;
        let path = home.join(Self::FOLDER);
        Ok(path)
    }

    fn get_path() -> Result<PathBuf, TranscribeError> {
        let base = Self::get_base_path()?;
        Ok(base.join("config.json"))
    }

    /// Creates config if it does not exist
    pub fn read_config() -> Result<Self, TranscribeError> {
        let base_path = Self::get_base_path()?;
        if !base_path.exists() {
            create_dir_all(base_path)?;
        }
        let config_path = Self::get_path()?;
        if !config_path.exists() {
            // create empty config
            Config::default().save_config()?;
        }
        let file = File::open(config_path)?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader).map_err(|err| {
            TranscribeError::ConfigError(format!("Could not read local configuration {err:}"))
        })?;
        Ok(config)
    }

    /// Assumes the config folder exists
    pub fn save_config(&self) -> Result<(), TranscribeError> {
        let config_path = Self::get_path()?;
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            TranscribeError::ConfigError(format!("Could not save local configuration {err:}"))
        })?;
        let mut file = File::create(config_path)?;
        file.write_all(json.as_bytes())?;
        log::info!("Saved local configuration");
        Ok(())
    }
}
