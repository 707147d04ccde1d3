use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the recipe backend (overrides SMARTCHEF_BACKEND_URL)
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Load every resolved image before display and swap broken ones for a placeholder
    #[arg(long, global = true)]
    pub check_images: bool,

    /// Print the enriched recipes as JSON instead of cards
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect ingredients in a photo and generate recipes from them
    Photo {
        /// Path to a JPG, PNG or WebP photo of your ingredients
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Generate recipes from a typed or dictated ingredient list
    Manual {
        /// Ingredients separated by commas
        #[arg(short, long, required_unless_present = "voice_file", conflicts_with = "voice_file")]
        ingredients: Option<String>,

        /// Transcript to dictate from, one recognized phrase per line
        #[arg(long)]
        voice_file: Option<PathBuf>,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_entry_with_global_flags() {
        let cli = Cli::try_parse_from([
            "smartchef",
            "manual",
            "--ingredients",
            "tomato, rice, garlic",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(!cli.check_images);
        assert!(matches!(
            cli.command,
            Command::Manual { ingredients: Some(ref text), voice_file: None } if text == "tomato, rice, garlic"
        ));
    }

    #[test]
    fn manual_requires_some_input() {
        assert!(Cli::try_parse_from(["smartchef", "manual"]).is_err());
    }

    #[test]
    fn typed_and_voice_input_conflict() {
        let result = Cli::try_parse_from([
            "smartchef",
            "manual",
            "--ingredients",
            "rice",
            "--voice-file",
            "notes.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn photo_takes_an_image_path() {
        let cli = Cli::try_parse_from([
            "smartchef",
            "--backend-url",
            "http://chef.test",
            "photo",
            "-i",
            "fridge.jpg",
        ])
        .unwrap();
        assert_eq!(cli.backend_url.as_deref(), Some("http://chef.test"));
        assert!(matches!(cli.command, Command::Photo { ref image } if image == &PathBuf::from("fridge.jpg")));
    }
}
