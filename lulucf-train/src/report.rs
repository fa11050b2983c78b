//! Rapport d'exécution de la chaîne
//!
//! Collecte les bilans de chaque étape, les résultats de validation, le
//! détail du tirage et les empreintes des sorties, puis les affiche et les
//! sauvegarde en JSON.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use landcover::stages::{SampleSelection, StepOutcome, ValidationReport};
use serde::Serialize;

/// Statut global de l'exécution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Toutes les étapes ont réussi
    Success,
    /// Terminé, avec des erreurs de validation rapportées
    CompletedWithWarnings,
    /// Interrompu par une erreur
    Failed,
}

/// Bilan d'une étape
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub name: String,
    /// Features produites
    pub features: usize,
    pub duration_secs: f64,
    /// Compteurs propres à l'étape
    pub details: BTreeMap<String, usize>,
}

/// Résultat d'une étape de validation isolée
#[derive(Debug, Clone, Serialize)]
pub struct ValidationStepRecord {
    pub completed: bool,
    pub message: Option<String>,
    pub details: BTreeMap<String, usize>,
}

/// Tirage d'une catégorie
#[derive(Debug, Clone, Serialize)]
pub struct SampleRecord {
    pub category: i64,
    pub label: String,
    pub population: usize,
    pub quota: usize,
    pub selected: usize,
}

/// Rapport complet
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub workspace: String,
    pub duration_secs: f64,
    pub status: RunStatus,
    pub stages: Vec<StageRecord>,
    pub repair: Option<ValidationStepRecord>,
    pub check: Option<ValidationStepRecord>,
    pub sample: Vec<SampleRecord>,
    /// Empreinte BLAKE3 par couche persistée
    pub fingerprints: BTreeMap<String, String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn new(workspace: &str) -> Self {
        Self {
            workspace: workspace.to_string(),
            duration_secs: 0.0,
            status: RunStatus::Success,
            stages: Vec::new(),
            repair: None,
            check: None,
            sample: Vec::new(),
            fingerprints: BTreeMap::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Enregistre le bilan d'une étape
    pub fn record_stage(
        &mut self,
        name: &str,
        features: usize,
        duration: Duration,
        details: impl IntoIterator<Item = (&'static str, usize)>,
    ) {
        self.stages.push(StageRecord {
            name: name.to_string(),
            features,
            duration_secs: duration.as_secs_f64(),
            details: details
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        });
    }

    /// Enregistre les résultats de la validation ; les échecs deviennent des warnings
    pub fn record_validation(&mut self, validation: &ValidationReport) {
        self.repair = Some(match &validation.repair {
            StepOutcome::Completed(summary) => ValidationStepRecord {
                completed: true,
                message: None,
                details: BTreeMap::from([
                    ("inspected".to_string(), summary.inspected),
                    ("repaired".to_string(), summary.repaired),
                    ("deleted".to_string(), summary.deleted),
                ]),
            },
            StepOutcome::Failed(message) => {
                self.warnings.push(format!("Geometry repair error: {}", message));
                failed_step(message)
            }
        });

        self.check = Some(match &validation.check {
            StepOutcome::Completed(summary) => {
                if !summary.is_clean() {
                    self.warnings.push(format!(
                        "Geometry check found {} problem(s)",
                        summary.problems
                    ));
                }
                ValidationStepRecord {
                    completed: true,
                    message: Some(format!("identifier field: {}", summary.identifier)),
                    details: BTreeMap::from([("problems".to_string(), summary.problems)]),
                }
            }
            StepOutcome::Failed(message) => {
                self.warnings.push(format!("Geometry check error: {}", message));
                failed_step(message)
            }
        });
    }

    /// Enregistre le détail du tirage
    pub fn record_sample(&mut self, selection: &SampleSelection) {
        self.sample = selection
            .categories
            .iter()
            .map(|c| SampleRecord {
                category: c.category.code(),
                label: c.category.label().to_string(),
                population: c.population,
                quota: c.quota,
                selected: c.selected.len(),
            })
            .collect();
    }

    pub fn record_fingerprint(&mut self, layer: &str, fingerprint: String) {
        self.fingerprints.insert(layer.to_string(), fingerprint);
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = if !self.errors.is_empty() {
            RunStatus::Failed
        } else if !self.warnings.is_empty() {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Success
        };
    }

    /// Nombre total de polygones tirés
    pub fn total_selected(&self) -> usize {
        self.sample.iter().map(|s| s.selected).sum()
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("LULUCF TRAINING DATA REPORT - {}", self.workspace);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        if !self.stages.is_empty() {
            println!("\n--- STAGES ---");
            for stage in &self.stages {
                let details: Vec<String> = stage
                    .details
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                println!(
                    "  {:<14} {:>8} features  {:>8.2}s  {}",
                    stage.name,
                    stage.features,
                    stage.duration_secs,
                    details.join(" ")
                );
            }
        }

        for (label, step) in [("Repair", &self.repair), ("Check", &self.check)] {
            if let Some(step) = step {
                let state = if step.completed { "completed" } else { "failed" };
                println!("\n{}: {}", label, state);
                if let Some(message) = &step.message {
                    println!("  {}", message);
                }
                for (k, v) in &step.details {
                    println!("  {}: {}", k, v);
                }
            }
        }

        if !self.sample.is_empty() {
            println!("\n--- SAMPLE ---");
            for s in &self.sample {
                println!(
                    "  {} {:<12} {:>4} / {:<4} (population {})",
                    s.category, s.label, s.selected, s.quota, s.population
                );
            }
            println!("  Total: {}", self.total_selected());
        }

        if !self.fingerprints.is_empty() {
            println!("\n--- FINGERPRINTS ---");
            for (layer, fp) in &self.fingerprints {
                println!("  {}: {}", layer, fp);
            }
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in &self.warnings {
                println!("  {}", w);
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in &self.errors {
                println!("  {}", e);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        let train = self
            .stages
            .iter()
            .rev()
            .find(|s| s.name == "normalize")
            .map_or(0, |s| s.features);
        format!(
            "{:?}: {} training polygons, {} selected, {} warnings, {} errors",
            self.status,
            train,
            self.total_selected(),
            self.warnings.len(),
            self.errors.len()
        )
    }
}

fn failed_step(message: &str) -> ValidationStepRecord {
    ValidationStepRecord {
        completed: false,
        message: Some(message.to_string()),
        details: BTreeMap::new(),
    }
}
