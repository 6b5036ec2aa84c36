//! Service registry: holds compiled workflows under a service id and
//! resolves resource state from runtime inputs.
//!
//! State resolution only substitutes parameter references. Any other deferred
//! invocation (`lookup`, custom functions) is left to the runtime and reported
//! as unsupported here.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::ir::{
    Deferred, DependencyGraph, Identifier, Literal, StepDefinition, StepKind, Value,
    WorkflowDefinition,
};
use crate::types::TypeRef;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("workflow '{name}' is already registered with service '{service_id}'")]
    DuplicateWorkflow { name: String, service_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no step named '{identifier}'")]
    UnknownStep { identifier: String },

    #[error("step '{identifier}' is not a resource step")]
    NotAResource { identifier: String },

    #[error("no value given for parameter '{name}' of step '{identifier}'")]
    MissingInput { identifier: String, name: String },

    #[error("the default of parameter '{name}' of step '{identifier}' refers back to itself")]
    CyclicDefault { identifier: String, name: String },

    #[error("invocation of '{name}' cannot be resolved before execution")]
    UnsupportedInvocation { name: String },
}

/// A registered top-level workflow.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition<'a> {
    pub identifier: &'a Identifier,
    pub service_id: &'a str,
    #[serde(skip)]
    pub step: &'a StepDefinition,
}

/// The resolved desired state of a resource step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    pub resource_type: TypeRef,
    pub attributes: IndexMap<String, Literal>,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.resource_type)?;
        for (i, (k, v)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{}' => {}", k, v)?;
        }
        f.write_str(")")
    }
}

#[derive(Debug)]
pub struct ServiceRegistry {
    service_id: String,
    workflows: Vec<WorkflowDefinition>,
}

impl ServiceRegistry {
    pub fn new(service_id: impl Into<String>) -> Self {
        ServiceRegistry {
            service_id: service_id.into(),
            workflows: Vec::new(),
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn register(&mut self, workflow: WorkflowDefinition) -> Result<(), RegistryError> {
        if self.workflows.iter().any(|w| w.name() == workflow.name()) {
            return Err(RegistryError::DuplicateWorkflow {
                name: workflow.name().to_string(),
                service_id: self.service_id.clone(),
            });
        }
        debug!(service = %self.service_id, workflow = workflow.name(), "registered workflow");
        self.workflows.push(workflow);
        Ok(())
    }

    /// Registered workflows in registration order.
    pub fn definitions(&self) -> Vec<Definition<'_>> {
        self.workflows
            .iter()
            .map(|w| Definition {
                identifier: &w.root().identifier,
                service_id: &self.service_id,
                step: w.root(),
            })
            .collect()
    }

    /// Any step of any registered workflow, by qualified identifier.
    pub fn step(&self, identifier: &str) -> Option<&StepDefinition> {
        self.workflows.iter().find_map(|w| w.find(identifier))
    }

    fn require(&self, identifier: &str) -> Result<&StepDefinition, ResolveError> {
        self.step(identifier).ok_or_else(|| ResolveError::UnknownStep {
            identifier: identifier.to_string(),
        })
    }

    /// Children of a container step in execution order. Empty for leaf steps.
    pub fn execution_order(&self, identifier: &str) -> Result<Vec<&StepDefinition>, ResolveError> {
        let step = self.require(identifier)?;
        Ok(DependencyGraph::build(step.steps()).execution_order())
    }

    /// Resolve the desired state of a resource step against runtime inputs.
    ///
    /// A `$name` reference takes `inputs[name]`, falling back to the default
    /// of the step's parameter `name`, which may itself refer to other
    /// parameters.
    pub fn state(
        &self,
        identifier: &str,
        inputs: &IndexMap<String, Literal>,
    ) -> Result<ResourceState, ResolveError> {
        let step = self.require(identifier)?;
        let StepKind::Resource {
            resource_type,
            state,
            ..
        } = &step.kind
        else {
            return Err(ResolveError::NotAResource {
                identifier: identifier.to_string(),
            });
        };

        let resolver = StateResolver { step, inputs };
        let attributes = state
            .iter()
            .map(|(k, v)| Ok((k.clone(), resolver.resolve(v, &mut Vec::new())?)))
            .collect::<Result<IndexMap<_, _>, ResolveError>>()?;

        Ok(ResourceState {
            resource_type: resource_type.clone(),
            attributes,
        })
    }
}

struct StateResolver<'a> {
    step: &'a StepDefinition,
    inputs: &'a IndexMap<String, Literal>,
}

impl<'a> StateResolver<'a> {
    /// `pending` holds the parameters whose defaults are being resolved.
    fn resolve(&self, value: &'a Value, pending: &mut Vec<&'a str>) -> Result<Literal, ResolveError> {
        match value {
            Value::Literal(l) => Ok(l.clone()),
            Value::Deferred(Deferred::Array(items)) => Ok(Literal::Array(
                items
                    .iter()
                    .map(|v| self.resolve(v, pending))
                    .collect::<Result<_, _>>()?,
            )),
            Value::Deferred(Deferred::Hash(entries)) => Ok(Literal::Hash(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve(v, pending)?)))
                    .collect::<Result<_, ResolveError>>()?,
            )),
            Value::Deferred(Deferred::Invocation(inv)) => match inv.referenced_parameter() {
                Some(name) => self.input(name, pending),
                None => Err(ResolveError::UnsupportedInvocation {
                    name: inv.name.clone(),
                }),
            },
        }
    }

    fn input(&self, name: &'a str, pending: &mut Vec<&'a str>) -> Result<Literal, ResolveError> {
        if let Some(value) = self.inputs.get(name) {
            return Ok(value.clone());
        }
        if pending.contains(&name) {
            return Err(ResolveError::CyclicDefault {
                identifier: self.step.identifier.to_string(),
                name: name.to_string(),
            });
        }
        let Some(default) = self.step.parameter(name).and_then(|p| p.value.as_ref()) else {
            return Err(ResolveError::MissingInput {
                identifier: self.step.identifier.to_string(),
                name: name.to_string(),
            });
        };
        pending.push(name);
        let value = self.resolve(default, pending)?;
        pending.pop();
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileOptions;
    use crate::lower::compile;
    use crate::types::TypeRegistry;

    const VPC: &str = "\
net:
  parameters:
    tags: Hash[String,String]
  steps:
    vpc:
      resource: Aws::Vpc
      parameters:
        cidr:
          value: 10.0.0.0/16
      value:
        cidrBlock: $cidr
        isDefault: false
        tags: $tags
    peer:
      resource: Aws::Vpc
      value:
        cidrBlock: !lookup net.cidr
";

    fn registry() -> ServiceRegistry {
        let types = TypeRegistry::builder()
            .object(
                "Aws::Vpc",
                [
                    ("cidrBlock", "String"),
                    ("isDefault", "Boolean"),
                    ("tags", "Hash[String, String]"),
                ],
            )
            .build()
            .unwrap();
        let wf = compile("net.yaml", VPC, &types, &CompileOptions::default()).unwrap();
        let mut registry = ServiceRegistry::new("Yaml::Test");
        registry.register(wf).unwrap();
        registry
    }

    fn tags() -> IndexMap<String, Literal> {
        let mut tags = IndexMap::new();
        tags.insert("a".to_string(), Literal::string("av"));
        let mut inputs = IndexMap::new();
        inputs.insert("tags".to_string(), Literal::Hash(tags));
        inputs
    }

    #[test]
    fn definitions_carry_service_id() {
        let registry = registry();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].identifier.as_str(), "net");
        assert_eq!(defs[0].service_id, "Yaml::Test");
        assert!(registry.step("net::vpc").is_some());
    }

    #[test]
    fn duplicate_workflows_are_rejected() {
        let mut registry = registry();
        let types = TypeRegistry::builder()
            .object("Aws::Vpc", [("cidrBlock", "String")])
            .build()
            .unwrap();
        let again = compile(
            "other.yaml",
            "net:\n  steps:\n    a: {call: x}\n",
            &types,
            &CompileOptions::default(),
        )
        .unwrap();
        assert!(matches!(
            registry.register(again),
            Err(RegistryError::DuplicateWorkflow { .. })
        ));
    }

    #[test]
    fn state_substitutes_inputs_and_defaults() {
        let state = registry().state("net::vpc", &tags()).unwrap();
        assert_eq!(
            state.to_string(),
            "Aws::Vpc('cidrBlock' => '10.0.0.0/16', 'isDefault' => false, 'tags' => {'a' => 'av'})"
        );
    }

    #[test]
    fn state_errors() {
        let registry = registry();
        assert_eq!(
            registry.state("net::vpc", &IndexMap::new()).unwrap_err(),
            ResolveError::MissingInput {
                identifier: "net::vpc".into(),
                name: "tags".into()
            }
        );
        assert_eq!(
            registry.state("net::peer", &tags()).unwrap_err(),
            ResolveError::UnsupportedInvocation {
                name: "lookup".into()
            }
        );
        assert!(matches!(
            registry.state("net", &tags()),
            Err(ResolveError::NotAResource { .. })
        ));
        assert!(matches!(
            registry.state("net::nope", &tags()),
            Err(ResolveError::UnknownStep { .. })
        ));
    }

    #[test]
    fn execution_order_of_root() {
        let registry = registry();
        let order = registry.execution_order("net").unwrap();
        assert_eq!(order.len(), 2);
        assert!(registry.execution_order("net::vpc").unwrap().is_empty());
    }

    const CHAIN: &str = "\
chain:
  steps:
    vpc:
      resource: Aws::Vpc
      parameters:
        base:
          value: 10.0.0.0/16
        cidr:
          value: $base
      value:
        cidrBlock: $cidr
";

    fn chain() -> WorkflowDefinition {
        let types = TypeRegistry::builder()
            .object("Aws::Vpc", [("cidrBlock", "String")])
            .build()
            .unwrap();
        compile("chain.yaml", CHAIN, &types, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn defaults_follow_parameter_references() {
        let mut registry = ServiceRegistry::new("Yaml::Test");
        registry.register(chain()).unwrap();
        let state = registry.state("chain::vpc", &IndexMap::new()).unwrap();
        assert_eq!(state.to_string(), "Aws::Vpc('cidrBlock' => '10.0.0.0/16')");

        let mut inputs = IndexMap::new();
        inputs.insert("base".to_string(), Literal::string("10.1.0.0/16"));
        let state = registry.state("chain::vpc", &inputs).unwrap();
        assert_eq!(state.to_string(), "Aws::Vpc('cidrBlock' => '10.1.0.0/16')");
    }

    #[test]
    fn cyclic_defaults_are_reported() {
        let mut root = chain().root().clone();
        if let StepKind::Workflow { steps } = &mut root.kind {
            steps[0].parameters[0].value = Some(Value::invocation("$cidr", vec![]));
        }
        let mut registry = ServiceRegistry::new("Yaml::Test");
        registry.register(WorkflowDefinition::new(root)).unwrap();
        assert_eq!(
            registry.state("chain::vpc", &IndexMap::new()).unwrap_err(),
            ResolveError::CyclicDefault {
                identifier: "chain::vpc".into(),
                name: "cidr".into()
            }
        );
    }
}
