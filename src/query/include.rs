//! Include requests attached to one query. Each `include` binds a root path to
//! the clause it came from; chained `then include` steps are appended to the
//! annotation bound to the same clause.

use serde::Serialize;

use crate::errors::OrmGraphError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IncludeAnnotation {
    pub context: String,
    pub path: Vec<String>,
    pub chain: Vec<String>,
}

impl IncludeAnnotation {
    /// Root path followed by the chained steps.
    pub fn full_path(&self) -> Vec<&str> {
        self.path
            .iter()
            .chain(&self.chain)
            .map(String::as_str)
            .collect()
    }

    fn same_request(&self, other: &IncludeAnnotation) -> bool {
        self.path == other.path && self.chain == other.chain
    }
}

/// One navigation in the merged include tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IncludeNode {
    pub name: String,
    pub children: Vec<IncludeNode>,
}

impl IncludeNode {
    fn insert(nodes: &mut Vec<IncludeNode>, path: &[&str]) {
        let Some((first, rest)) = path.split_first() else {
            return;
        };
        let index = match nodes.iter().position(|n| n.name == *first) {
            Some(index) => index,
            None => {
                nodes.push(IncludeNode {
                    name: first.to_string(),
                    children: Vec::new(),
                });
                nodes.len() - 1
            }
        };
        Self::insert(&mut nodes[index].children, rest);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IncludePipeline {
    annotations: Vec<IncludeAnnotation>,
}

impl IncludePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_include(&mut self, context: &str, path: &str) -> Result<(), OrmGraphError> {
        if context.trim().is_empty() {
            return Err(OrmGraphError::invalid_argument("include context must be set"));
        }
        let path = split_path(path)?;
        self.annotations.push(IncludeAnnotation {
            context: context.to_string(),
            path,
            chain: Vec::new(),
        });
        Ok(())
    }

    pub fn append_chain(&mut self, context: &str, steps: &[&str]) -> Result<(), OrmGraphError> {
        let mut parsed = Vec::with_capacity(steps.len());
        for step in steps {
            parsed.extend(split_path(step)?);
        }
        let annotation = self
            .annotations
            .iter_mut()
            .rev()
            .find(|a| a.context == context)
            .ok_or_else(|| OrmGraphError::dangling_include(context))?;
        annotation.chain.extend(parsed);
        Ok(())
    }

    /// Annotations in request order; repeated requests for the same root and
    /// chain appear once.
    pub fn annotations(&self) -> Vec<&IncludeAnnotation> {
        let mut out: Vec<&IncludeAnnotation> = Vec::new();
        for annotation in &self.annotations {
            if !out.iter().any(|seen| seen.same_request(annotation)) {
                out.push(annotation);
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Annotations merged into a tree; shared roots appear once.
    pub fn navigation_tree(&self) -> Vec<IncludeNode> {
        let mut roots = Vec::new();
        for annotation in self.annotations() {
            IncludeNode::insert(&mut roots, &annotation.full_path());
        }
        roots
    }
}

fn split_path(path: &str) -> Result<Vec<String>, OrmGraphError> {
    if path.trim().is_empty() {
        return Err(OrmGraphError::invalid_argument("include path must not be empty"));
    }
    path.split('.')
        .map(|segment| {
            let segment = segment.trim();
            if segment.is_empty() {
                Err(OrmGraphError::invalid_argument(format!(
                    "include path '{path}' has an empty segment"
                )))
            } else {
                Ok(segment.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_path_is_split() {
        let mut pipeline = IncludePipeline::new();
        pipeline.add_include("q", "Orders.Lines").expect("include");
        assert_eq!(pipeline.annotations()[0].path, vec!["Orders", "Lines"]);
        let err = pipeline.add_include("q", "Orders..Lines").expect_err("segment");
        assert!(matches!(err, OrmGraphError::InvalidArgument(_)));
    }
}
