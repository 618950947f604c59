use colored::Colorize;

pub struct Theme {
    pub title: fn(&str) -> String,
    pub para: fn(&str) -> String,
    pub strong: fn(&str) -> String,
    pub link: fn(&str) -> String,
    /// Links whose detail query is already cached.
    pub visited: fn(&str) -> String,
    pub loading: fn(&str) -> String,
    pub error: fn(&str) -> String,
    pub updating: fn(&str) -> String,
}

impl Theme {
    pub fn from_name(name: &str) -> Self {
        match name {
            "temp" | "" => Self::temp(),
            "wudao" => Self::wudao(),
            "canvas" => Self::canvas(),
            "plain" => Self::plain(),
            _ => {
                eprintln!("{}", format!("✘ Unknown theme: {}", name).red());
                Self::temp() // Fallback to default
            }
        }
    }

    fn temp() -> Self {
        Self {
            title: |s| s.bright_magenta().italic().bold().underline().to_string(),
            para: |s| s.white().to_string(),
            strong: |s| s.bright_white().bold().to_string(),
            link: |s| s.blue().underline().to_string(),
            visited: |s| s.green().bold().underline().to_string(),
            loading: |s| s.bright_black().dimmed().italic().to_string(),
            error: |s| s.red().to_string(),
            updating: |s| s.bright_white().dimmed().italic().to_string(),
        }
    }

    fn wudao() -> Self {
        Self {
            title: |s| s.red().italic().bold().underline().to_string(),
            para: |s| s.white().to_string(),
            strong: |s| s.cyan().bold().to_string(),
            link: |s| s.bright_white().underline().to_string(),
            visited: |s| s.green().bold().to_string(),
            loading: |s| s.bright_yellow().dimmed().italic().to_string(),
            error: |s| s.red().italic().to_string(),
            updating: |s| s.green().italic().to_string(),
        }
    }

    fn canvas() -> Self {
        Self {
            title: |s| s.blue().bold().underline().to_string(),
            para: |s| s.black().to_string(),
            strong: |s| s.black().bold().to_string(),
            link: |s| s.cyan().underline().to_string(),
            visited: |s| s.green().bold().to_string(),
            loading: |s| s.bright_black().italic().to_string(),
            error: |s| s.red().bold().to_string(),
            updating: |s| s.bright_blue().to_string(),
        }
    }

    /// No escape codes; for pipes and `--no-color`.
    pub fn plain() -> Self {
        Self {
            title: |s| s.to_string(),
            para: |s| s.to_string(),
            strong: |s| s.to_string(),
            link: |s| s.to_string(),
            visited: |s| s.to_string(),
            loading: |s| s.to_string(),
            error: |s| s.to_string(),
            updating: |s| s.to_string(),
        }
    }
}
