//! Interface de linha de comando do renderflow baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (submit, watch,
//! status, demo) e flags globais (--config, --interval-ms, --window-secs,
//! --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::jobs::{GenerationKind, Quality};

/// renderflow: submete gerações de imagem e vídeo e acompanha até concluírem.
#[derive(Debug, Parser)]
#[command(name = "renderflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./renderflow.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Intervalo entre consultas de status, em milissegundos.
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,

    /// Duração máxima de uma sessão de polling, em segundos.
    #[arg(long, global = true)]
    pub window_secs: Option<u64>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Tipo de mídia aceito pela CLI, mapeado para [`GenerationKind`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Image,
    Video,
}

impl From<KindArg> for GenerationKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Image => GenerationKind::Image,
            KindArg::Video => GenerationKind::Video,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum QualityArg {
    Standard,
    High,
    Ultra,
}

impl From<QualityArg> for Quality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Standard => Quality::Standard,
            QualityArg::High => Quality::High,
            QualityArg::Ultra => Quality::Ultra,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submete uma geração e acompanha até todos os resultados chegarem.
    Submit {
        /// Projeto dono dos renders.
        #[arg(long)]
        project: String,

        /// Descrição do que gerar.
        prompt: String,

        #[arg(long, value_enum, default_value = "image")]
        kind: KindArg,

        #[arg(long, value_enum, default_value = "standard")]
        quality: QualityArg,

        #[arg(long, default_value = "16:9")]
        aspect_ratio: String,

        /// Duração do vídeo em segundos.
        #[arg(long)]
        duration: Option<u32>,

        /// Gera um lote com um resultado por rótulo (repetível).
        #[arg(long = "label")]
        labels: Vec<String>,

        /// Número de resultados sem rótulo próprio.
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Créditos por unidade de trabalho.
        #[arg(long, default_value_t = 0)]
        cost: u64,

        /// Saldo atual; quando informado, a submissão é verificada localmente.
        #[arg(long)]
        credits: Option<u64>,

        /// Não acompanha os jobs após a submissão.
        #[arg(long, default_value_t = false)]
        no_wait: bool,
    },

    /// Acompanha jobs já submetidos até concluírem.
    Watch {
        #[arg(long)]
        project: String,

        /// Ids dos jobs a acompanhar.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Lista o status atual dos jobs de um projeto.
    Status {
        #[arg(long)]
        project: String,

        /// Imprime a listagem em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Executa a demonstração contra um backend simulado em memória.
    Demo {
        /// Número de jobs no lote simulado.
        #[arg(long, default_value_t = 3)]
        jobs: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_submit_subcommand() {
        let cli = Cli::parse_from([
            "renderflow",
            "submit",
            "--project",
            "p1",
            "--label",
            "Floor Plan",
            "--label",
            "Elevation - North",
            "--cost",
            "10",
            "modern loft",
        ]);
        match cli.command {
            Command::Submit {
                project,
                prompt,
                labels,
                cost,
                kind,
                no_wait,
                ..
            } => {
                assert_eq!(project, "p1");
                assert_eq!(prompt, "modern loft");
                assert_eq!(labels, vec!["Floor Plan", "Elevation - North"]);
                assert_eq!(cost, 10);
                assert!(matches!(kind, KindArg::Image));
                assert!(!no_wait);
            }
            _ => panic!("expected Submit command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "renderflow",
            "--interval-ms",
            "500",
            "--window-secs",
            "30",
            "--verbose",
            "demo",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.interval_ms, Some(500));
        assert_eq!(cli.window_secs, Some(30));
        assert!(matches!(cli.command, Command::Demo { jobs: 3 }));
    }

    #[test]
    fn cli_watch_requires_ids() {
        assert!(Cli::try_parse_from(["renderflow", "watch", "--project", "p1"]).is_err());
        let cli = Cli::parse_from(["renderflow", "watch", "--project", "p1", "a", "b"]);
        assert!(matches!(cli.command, Command::Watch { ref ids, .. } if ids.len() == 2));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
