mod assessors;
mod cli;
mod config;
mod engine;
mod error;
mod intake;
mod observe;
mod report;
mod router;
mod stages;
mod state_machine;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use crate::assessors::{
    Assessor, CaEnglishGrammarAssessor, CaFrenchGrammarAssessor, FaultInjector, MockTranslator,
    NeverFlag, NuanceAssessor, QualityProbe, RandomProbe, RemoteAssessor, StyleToneAssessor,
    TerminologyAssessor, Translator,
};
use crate::cli::{Cli, Command};
use crate::config::BureauConfig;
use crate::engine::{CancelFlag, Escalation, RetryPolicy, WorkflowEngine};
use crate::intake::TaskSeed;
use crate::observe::{ConsoleObserver, WorkflowObserver};
use crate::report::{bureau_report, print_audit, task_report, ConsoleEscalation, RunProgress};
use crate::stages::{
    FinalGateStage, GrammarStage, NuanceStage, StageProcessor, StyleStage, TerminologyStage,
    TranslationStage,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = BureauConfig::load()?;
    if let Some(max_retries) = cli.max_retries {
        config.max_api_retries = max_retries;
    }
    if let Some(max_revisions) = cli.max_revisions {
        config.max_revisions_per_stage = max_revisions;
    }

    match cli.command {
        Command::Run { file } => {
            let seeds = intake::load_seeds(&file)?;
            run_pipeline(seeds, &config, cli.verbose, false).await
        }
        Command::Demo => run_pipeline(intake::sample_corpus(), &config, cli.verbose, true).await,
        Command::Status => {
            print_status(&config);
            Ok(())
        }
    }
}

struct AssessorSet {
    frca_grammar: Arc<dyn Assessor>,
    enca_grammar: Arc<dyn Assessor>,
    nuance: Arc<dyn Assessor>,
    style: Arc<dyn Assessor>,
    terminology: Arc<dyn Assessor>,
}

/// The demo wraps the rule-based assessors in seeded fault injectors; a
/// normal run uses the remote service when configured, plain rules
/// otherwise.
fn build_assessors(config: &BureauConfig, demo: bool) -> AssessorSet {
    if demo {
        let seed = config.demo_seed.unwrap_or(42);
        let rate = config.demo_fault_rate;
        return AssessorSet {
            frca_grammar: Arc::new(FaultInjector::new(CaFrenchGrammarAssessor::new(), rate, seed)),
            enca_grammar: Arc::new(FaultInjector::new(
                CaEnglishGrammarAssessor::new(),
                rate,
                seed.wrapping_add(1),
            )),
            nuance: Arc::new(NuanceAssessor::new()),
            style: Arc::new(StyleToneAssessor::new()),
            terminology: Arc::new(FaultInjector::new(
                TerminologyAssessor::new(),
                rate,
                seed.wrapping_add(2),
            )),
        };
    }

    if let Some(remote) = &config.remote {
        let client = |check: &str| -> Arc<dyn Assessor> {
            Arc::new(RemoteAssessor::new(
                remote.base_url.clone(),
                remote.api_key.clone(),
                check,
            ))
        };
        return AssessorSet {
            frca_grammar: client("grammar_frca"),
            enca_grammar: client("grammar_enca"),
            nuance: client("nuance"),
            style: client("style"),
            terminology: client("terminology"),
        };
    }

    AssessorSet {
        frca_grammar: Arc::new(CaFrenchGrammarAssessor::new()),
        enca_grammar: Arc::new(CaEnglishGrammarAssessor::new()),
        nuance: Arc::new(NuanceAssessor::new()),
        style: Arc::new(StyleToneAssessor::new()),
        terminology: Arc::new(TerminologyAssessor::new()),
    }
}

async fn run_pipeline(
    seeds: Vec<TaskSeed>,
    config: &BureauConfig,
    verbose: bool,
    demo: bool,
) -> Result<()> {
    let observer: Arc<dyn WorkflowObserver> = Arc::new(ConsoleObserver::new(verbose));
    let escalation: Arc<dyn Escalation> = Arc::new(ConsoleEscalation::new());
    let set = build_assessors(config, demo);
    let probe: Arc<dyn QualityProbe> = if demo {
        let seed = config.demo_seed.unwrap_or(42);
        Arc::new(RandomProbe::new(0.35, seed.wrapping_add(3)))
    } else {
        Arc::new(NeverFlag)
    };
    let translator: Arc<dyn Translator> = if demo {
        Arc::new(MockTranslator::with_quirks())
    } else {
        Arc::new(MockTranslator::new())
    };

    let timeout = Duration::from_millis(config.assessor_timeout_ms);
    let revision_cap = config.max_revisions_per_stage;
    let processors: Vec<Arc<dyn StageProcessor>> = vec![
        Arc::new(TranslationStage::new(translator, observer.clone())),
        Arc::new(GrammarStage::new(
            set.frca_grammar,
            set.enca_grammar,
            observer.clone(),
            timeout,
            revision_cap,
        )),
        Arc::new(NuanceStage::new(
            set.nuance,
            observer.clone(),
            timeout,
            revision_cap,
        )),
        Arc::new(StyleStage::new(
            set.style,
            observer.clone(),
            timeout,
            revision_cap,
        )),
        Arc::new(TerminologyStage::new(
            set.terminology,
            observer.clone(),
            timeout,
            revision_cap,
        )),
        Arc::new(FinalGateStage::new(
            observer.clone(),
            probe,
            config.final_check_order.clone(),
            revision_cap,
            config.max_final_quality_revisions,
        )),
    ];

    let engine = Arc::new(WorkflowEngine::new(
        processors,
        escalation,
        observer,
        RetryPolicy {
            max_retries: config.max_api_retries,
            base_delay_ms: config.retry_base_delay_ms,
        },
        revision_cap,
        config.max_engine_iterations,
    ));

    let tasks = intake::seed_tasks(
        seeds,
        &config.default_project_code,
        &config.default_target_style,
    );
    let cancel = CancelFlag::new();
    {
        // Ctrl-C cancels between stage invocations; in-flight stages finish.
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let progress = RunProgress::start(tasks.len());
    let done = engine.run_concurrent(tasks, cancel).await;
    progress.finish(&done);

    println!("\n{}", bureau_report(&done));
    for task in done
        .iter()
        .filter(|t| t.current_state.is_hard_failure())
        .take(3)
    {
        println!("\n{}", task_report(task));
        if verbose {
            print_audit(task);
        }
    }
    Ok(())
}

fn print_status(config: &BureauConfig) {
    println!("bureau configuration:");
    println!("  supported pairs: EN_CA -> FR_CA, FR_CA -> EN_CA");
    println!("  max API retries per step: {}", config.max_api_retries);
    println!(
        "  max revisions per stage key: {}",
        config.max_revisions_per_stage
    );
    println!(
        "  subtle-quality revision budget: {}",
        config.max_final_quality_revisions
    );
    println!("  assessor timeout: {}ms", config.assessor_timeout_ms);
    println!("  final check order: {:?}", config.final_check_order);
    match &config.remote {
        Some(remote) => println!("  assessors: remote ({})", remote.base_url),
        None => println!("  assessors: built-in rules"),
    }
}
