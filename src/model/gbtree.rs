//! Gradient-boosted tree ensemble in the XGBoost JSON model format.
//!
//! Only what inference needs is read from the file: the learner parameters,
//! the `gbtree` booster with its trees and tree-to-class assignment, and the
//! objective name. Trees are evaluated with XGBoost's rules: numeric splits go
//! left when `x < split_condition`, missing (NaN) values follow
//! `default_left`, and leaf values are stored in `split_conditions`.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::{check_feature_len, Classifier, ModelError};

#[derive(Deserialize)]
struct ModelFile {
    learner: LearnerJson,
}

#[derive(Deserialize)]
struct LearnerJson {
    /// Free-form string attributes; early stopping records `best_iteration` here
    #[serde(default)]
    attributes: HashMap<String, String>,
    learner_model_param: LearnerModelParam,
    gradient_booster: BoosterJson,
    objective: ObjectiveJson,
}

/// XGBoost writes these as strings ("7", "5E-1", "[5E-1,5E-1]")
#[derive(Deserialize)]
struct LearnerModelParam {
    #[serde(default)]
    base_score: Option<String>,
    #[serde(default)]
    num_class: Option<String>,
    num_feature: String,
}

#[derive(Deserialize)]
struct BoosterJson {
    name: String,
    #[serde(default)]
    model: Option<GbtreeJson>,
}

#[derive(Deserialize)]
struct GbtreeJson {
    trees: Vec<TreeJson>,
    tree_info: Vec<usize>,
    /// Tree offsets per boosting round, `rounds + 1` entries
    #[serde(default)]
    iteration_indptr: Option<Vec<usize>>,
    #[serde(default)]
    gbtree_model_param: Option<GbtreeModelParam>,
}

#[derive(Deserialize)]
struct GbtreeModelParam {
    #[serde(default)]
    num_parallel_tree: Option<String>,
}

#[derive(Deserialize)]
struct TreeJson {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// Older files store booleans, newer ones 0/1
#[derive(Deserialize, Clone, Copy)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

#[derive(Deserialize)]
struct ObjectiveJson {
    name: String,
}

/// How group margins become class probabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// `multi:softprob` / `multi:softmax`: one margin per class, softmax
    Softmax,
    /// `binary:logistic`: one margin, sigmoid gives P(class 1)
    Logistic,
}

impl Objective {
    fn from_name(name: &str) -> Result<Self, ModelError> {
        match name {
            "multi:softprob" | "multi:softmax" => Ok(Self::Softmax),
            "binary:logistic" => Ok(Self::Logistic),
            other => Err(ModelError::UnsupportedObjective(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    left: i32,
    right: i32,
    feature: usize,
    /// Split threshold for internal nodes, output value for leaves
    value: f32,
    default_left: bool,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.left < 0
    }
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_json(tree: TreeJson, num_features: usize, tree_idx: usize) -> Result<Self, ModelError> {
        let n = tree.left_children.len();
        let invalid = |msg: String| ModelError::InvalidModel(format!("tree {}: {}", tree_idx, msg));

        if n == 0 {
            return Err(invalid("no nodes".to_string()));
        }
        if tree.right_children.len() != n
            || tree.split_indices.len() != n
            || tree.split_conditions.len() != n
            || tree.default_left.len() != n
        {
            return Err(invalid("node arrays differ in length".to_string()));
        }
        if tree.split_type.iter().any(|&t| t != 0) {
            return Err(invalid("categorical splits are not supported".to_string()));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (tree.left_children[i], tree.right_children[i]);
            let feature = tree.split_indices[i] as usize;

            if left >= 0 {
                // Children always come after their parent, which also rules out cycles
                let in_range = |c: i32| c as usize > i && (c as usize) < n;
                if !in_range(left) || !in_range(right) {
                    return Err(invalid(format!("node {} has children {}/{}", i, left, right)));
                }
                if feature >= num_features {
                    return Err(invalid(format!(
                        "node {} splits on feature {} of {}",
                        i, feature, num_features
                    )));
                }
            }

            nodes.push(Node {
                left,
                right,
                feature,
                value: tree.split_conditions[i],
                default_left: tree.default_left[i].is_set(),
            });
        }

        Ok(Self { nodes })
    }

    fn leaf_value(&self, features: &[f32]) -> f32 {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            if node.is_leaf() {
                return node.value;
            }
            let x = features[node.feature];
            let go_left = if x.is_nan() {
                node.default_left
            } else {
                x < node.value
            };
            let next = if go_left { node.left } else { node.right };
            idx = next as usize;
        }
    }
}

/// Gradient-boosted decision tree classifier
#[derive(Debug, Clone)]
pub struct GradientBoostedTrees {
    objective: Objective,
    num_features: usize,
    /// Starting margin per output group
    base_margin: Vec<f32>,
    trees: Vec<Tree>,
    tree_group: Vec<usize>,
}

impl GradientBoostedTrees {
    /// Parse a model saved with `Booster.save_model("model.json")`
    pub fn from_json_str(content: &str) -> Result<Self, ModelError> {
        let file: ModelFile = serde_json::from_str(content)
            .map_err(|e| ModelError::InvalidModel(format!("JSON: {}", e)))?;
        let learner = file.learner;

        let objective = Objective::from_name(&learner.objective.name)?;

        if learner.gradient_booster.name != "gbtree" {
            return Err(ModelError::InvalidModel(format!(
                "booster {:?} is not supported, expected \"gbtree\"",
                learner.gradient_booster.name
            )));
        }
        let booster = learner
            .gradient_booster
            .model
            .ok_or_else(|| ModelError::InvalidModel("gbtree has no model".to_string()))?;

        let params = learner.learner_model_param;
        let num_features = parse_count(&params.num_feature, "num_feature")?;
        if num_features == 0 {
            return Err(ModelError::InvalidModel("num_feature is 0".to_string()));
        }

        let num_groups = match objective {
            Objective::Softmax => {
                let num_class = params
                    .num_class
                    .as_deref()
                    .map(|s| parse_count(s, "num_class"))
                    .transpose()?
                    .unwrap_or(0);
                if num_class < 2 {
                    return Err(ModelError::InvalidModel(format!(
                        "softmax objective needs at least 2 classes, got {}",
                        num_class
                    )));
                }
                num_class
            }
            Objective::Logistic => 1,
        };

        let base_margin = base_margin(params.base_score.as_deref(), objective, num_groups)?;

        if booster.tree_info.len() != booster.trees.len() {
            return Err(ModelError::InvalidModel(format!(
                "{} trees but {} tree_info entries",
                booster.trees.len(),
                booster.tree_info.len()
            )));
        }
        if let Some(&group) = booster.tree_info.iter().find(|&&g| g >= num_groups) {
            return Err(ModelError::InvalidModel(format!(
                "tree assigned to group {} of {}",
                group, num_groups
            )));
        }

        let used = match learner.attributes.get("best_iteration") {
            Some(best) => {
                let best = parse_count(best, "best_iteration")?;
                let limit = trees_through_round(&booster, best, num_groups)?;
                debug!("Early stopping at round {}: using {} trees", best, limit);
                limit
            }
            None => booster.trees.len(),
        };

        let mut tree_group = booster.tree_info;
        tree_group.truncate(used);

        let trees = booster
            .trees
            .into_iter()
            .take(used)
            .enumerate()
            .map(|(i, t)| Tree::from_json(t, num_features, i))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Loaded {} trees, {} features, {} output groups ({:?})",
            trees.len(),
            num_features,
            num_groups,
            objective
        );

        Ok(Self {
            objective,
            num_features,
            base_margin,
            trees,
            tree_group,
        })
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw per-group scores before the objective's link function
    pub fn margins(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
        check_feature_len(self.num_features, features)?;

        let mut margins = self.base_margin.clone();
        for (tree, &group) in self.trees.iter().zip(&self.tree_group) {
            margins[group] += tree.leaf_value(features);
        }
        Ok(margins)
    }
}

impl Classifier for GradientBoostedTrees {
    fn num_features(&self) -> usize {
        self.num_features
    }

    fn num_classes(&self) -> usize {
        match self.objective {
            Objective::Softmax => self.base_margin.len(),
            Objective::Logistic => 2,
        }
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
        let margins = self.margins(features)?;
        Ok(match self.objective {
            Objective::Softmax => softmax(&margins),
            Objective::Logistic => {
                let p = sigmoid(margins[0]);
                vec![1.0 - p, p]
            }
        })
    }
}

fn parse_count(value: &str, field: &str) -> Result<usize, ModelError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
        .map(|v| v as usize)
        .ok_or_else(|| ModelError::InvalidModel(format!("{} is not a count: {:?}", field, value)))
}

/// Number of leading trees that make up rounds `0..=round`.
///
/// Uses `iteration_indptr` when present, otherwise assumes every round adds
/// `num_groups * num_parallel_tree` trees.
fn trees_through_round(
    booster: &GbtreeJson,
    round: usize,
    num_groups: usize,
) -> Result<usize, ModelError> {
    let limit = match &booster.iteration_indptr {
        Some(indptr) if !indptr.is_empty() => {
            *indptr.get(round.saturating_add(1)).ok_or_else(|| {
                ModelError::InvalidModel(format!(
                    "best_iteration {} but only {} rounds",
                    round,
                    indptr.len() - 1
                ))
            })?
        }
        _ => {
            let parallel = booster
                .gbtree_model_param
                .as_ref()
                .and_then(|p| p.num_parallel_tree.as_deref())
                .map(|s| parse_count(s, "num_parallel_tree"))
                .transpose()?
                .unwrap_or(1)
                .max(1);
            round.saturating_add(1).saturating_mul(num_groups * parallel)
        }
    };

    if limit > booster.trees.len() {
        return Err(ModelError::InvalidModel(format!(
            "best_iteration {} needs {} trees, model has {}",
            round,
            limit,
            booster.trees.len()
        )));
    }
    Ok(limit)
}

/// Parse `base_score` (scalar or bracketed list) into per-group margins
fn base_margin(
    raw: Option<&str>,
    objective: Objective,
    num_groups: usize,
) -> Result<Vec<f32>, ModelError> {
    let scores: Vec<f32> = match raw {
        None => vec![0.5],
        Some(s) => s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(|v| {
                v.trim().parse::<f32>().map_err(|_| {
                    ModelError::InvalidModel(format!("base_score is not numeric: {:?}", s))
                })
            })
            .collect::<Result<_, _>>()?,
    };

    let scores = match scores.len() {
        1 => vec![scores[0]; num_groups],
        n if n == num_groups => scores,
        n => {
            return Err(ModelError::InvalidModel(format!(
                "base_score has {} values for {} groups",
                n, num_groups
            )))
        }
    };

    match objective {
        Objective::Softmax => Ok(scores),
        Objective::Logistic => scores
            .into_iter()
            .map(|p| {
                if p > 0.0 && p < 1.0 {
                    Ok((p / (1.0 - p)).ln())
                } else {
                    Err(ModelError::InvalidModel(format!(
                        "logistic base_score must be in (0, 1), got {}",
                        p
                    )))
                }
            })
            .collect(),
    }
}

fn softmax(margins: &[f32]) -> Vec<f32> {
    let max = margins.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = margins.iter().map(|m| (m - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
