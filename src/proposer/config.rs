//! Proposer configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

fn parse<T: for<'de> Deserialize<'de>>(json: &str) -> Result<T, ValidationError> {
    serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig { reason: e.to_string() })
}

fn require_positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NonPositive {
            field: field.to_string(),
            value,
        })
    }
}

/// Settings for the single-variable Gibbs proposer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GibbsConfig {
    /// RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Grid points used to discretize continuous conditionals.
    pub resolution: usize,
}

impl Default for GibbsConfig {
    fn default() -> Self {
        Self {
            seed: None,
            resolution: 32,
        }
    }
}

impl GibbsConfig {
    /// Parses and validates a JSON config; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let config: Self = parse(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `Zero` for a zero resolution.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.resolution == 0 {
            return Err(ValidationError::Zero {
                field: "resolution".to_string(),
            });
        }
        Ok(())
    }
}

/// How the theta update counts observation units per trigger bin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThetaCounting {
    /// Every sentence counts toward every relation's theta.
    #[default]
    AllUnits,
    /// Only sentences whose source fact belongs to the relation count
    /// (the exact conjugate conditional).
    AttributedUnits,
}

/// Names of the types and functions of the relation-extraction model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationSchema {
    /// Type of relations.
    pub relation_type: String,
    /// Type of entities.
    pub entity_type: String,
    /// Type generated by `#Fact(Relation, Entity, Entity)`.
    pub fact_type: String,
    /// Type of trigger words.
    pub trigger_type: String,
    /// Type of sentences.
    pub sentence_type: String,
    /// Per-relation sparsity function.
    pub sparsity: String,
    /// Per-fact truth indicator.
    pub holds: String,
    /// Per-relation trigger distribution.
    pub theta: String,
    /// Fact a sentence expresses.
    pub source_fact: String,
    /// Subject entity of a sentence.
    pub subject: String,
    /// Object entity of a sentence.
    pub object: String,
    /// Trigger index of a sentence.
    pub trigger_id: String,
    /// Observed trigger word of a sentence.
    pub verb: String,
}

impl Default for RelationSchema {
    fn default() -> Self {
        Self {
            relation_type: "Relation".to_string(),
            entity_type: "Entity".to_string(),
            fact_type: "Fact".to_string(),
            trigger_type: "Trigger".to_string(),
            sentence_type: "Sentence".to_string(),
            sparsity: "Sparsity".to_string(),
            holds: "Holds".to_string(),
            theta: "Theta".to_string(),
            source_fact: "SourceFact".to_string(),
            subject: "Subject".to_string(),
            object: "Object".to_string(),
            trigger_id: "TriggerID".to_string(),
            verb: "Verb".to_string(),
        }
    }
}

impl RelationSchema {
    fn names(&self) -> [(&'static str, &str); 13] {
        [
            ("relation_type", self.relation_type.as_str()),
            ("entity_type", self.entity_type.as_str()),
            ("fact_type", self.fact_type.as_str()),
            ("trigger_type", self.trigger_type.as_str()),
            ("sentence_type", self.sentence_type.as_str()),
            ("sparsity", self.sparsity.as_str()),
            ("holds", self.holds.as_str()),
            ("theta", self.theta.as_str()),
            ("source_fact", self.source_fact.as_str()),
            ("subject", self.subject.as_str()),
            ("object", self.object.as_str()),
            ("trigger_id", self.trigger_id.as_str()),
            ("verb", self.verb.as_str()),
        ]
    }
}

/// Settings for the composite relation-extraction proposer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationProposerConfig {
    /// RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Beta prior on Sparsity, used only when the model declares no
    /// dependency for it.
    pub alpha: f64,
    /// See `alpha`.
    pub beta: f64,
    /// Symmetric Dirichlet concentration on Theta, used only when the model
    /// declares no dependency for it.
    pub dirichlet_alpha: f64,
    /// Dispatch the (unimplemented) source-fact and holds switch moves.
    /// They return placeholder proposals that leave the world unchanged.
    pub enable_switch_moves: bool,
    /// Which sentences count toward a Theta update.
    pub theta_counting: ThetaCounting,
    /// Type and function names of the model.
    pub schema: RelationSchema,
}

impl Default for RelationProposerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            alpha: 1.0,
            beta: 1.0,
            dirichlet_alpha: 1.0,
            enable_switch_moves: false,
            theta_counting: ThetaCounting::AllUnits,
            schema: RelationSchema::default(),
        }
    }
}

impl RelationProposerConfig {
    /// Parses and validates a JSON config; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let config: Self = parse(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `NonPositive` for a bad prior parameter, `InvalidConfig` for an
    /// empty schema name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive("alpha", self.alpha)?;
        require_positive("beta", self.beta)?;
        require_positive("dirichlet_alpha", self.dirichlet_alpha)?;
        for (field, name) in self.schema.names() {
            if name.trim().is_empty() {
                return Err(ValidationError::InvalidConfig {
                    reason: format!("schema.{field} must not be empty"),
                });
            }
        }
        Ok(())
    }
}
