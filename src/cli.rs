//! Interface de linha de comando do bureau baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, demo, status)
//! e flags globais (--max-retries, --max-revisions, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// bureau — Orquestrador de controle de qualidade de traduções.
#[derive(Debug, Parser)]
#[command(name = "bureau", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Número máximo de retentativas de API por etapa.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Cota de revisões por chave de estágio.
    #[arg(long, global = true)]
    pub max_revisions: Option<u32>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Processa as tarefas de um arquivo de sementes (TOML ou JSON).
    Run {
        /// Caminho para o arquivo de sementes.
        file: PathBuf,
    },

    /// Executa o corpus de demonstração embutido, com falhas injetadas.
    Demo,

    /// Mostra a configuração resolvida e os pares de idiomas suportados.
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["bureau", "run", "tasks.toml"]);
        match cli.command {
            Command::Run { file } => assert_eq!(file, PathBuf::from("tasks.toml")),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "bureau",
            "--max-retries",
            "5",
            "--max-revisions",
            "4",
            "--verbose",
            "demo",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.max_retries, Some(5));
        assert_eq!(cli.max_revisions, Some(4));
        assert!(matches!(cli.command, Command::Demo));
    }

    #[test]
    fn cli_parses_status() {
        let cli = Cli::parse_from(["bureau", "status"]);
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
