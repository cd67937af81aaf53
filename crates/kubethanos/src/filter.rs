//! Candidate filters: namespace scope and liveness.

use std::collections::BTreeMap;

use crate::error::ScopeError;
use crate::instance::Instance;
use crate::selector::{Operator, Requirement, ScopeSelector};

/// Keep the instances whose namespace is in scope.
///
/// `Exists` requirements include a namespace, `DoesNotExist` requirements exclude
/// one. Each instance is matched through a synthetic label set `{namespace: ""}`;
/// an exclude requirement that does not match that set drops the instance even if
/// an include requirement matched. Any other operator fails the whole call.
pub fn filter_by_namespaces(
    instances: &[Instance],
    selector: &ScopeSelector,
) -> Result<Vec<Instance>, ScopeError> {
    if selector.is_empty() {
        return Ok(instances.to_vec());
    }

    let mut include: Vec<&Requirement> = Vec::new();
    let mut exclude: Vec<&Requirement> = Vec::new();
    for req in selector.requirements() {
        match req.operator() {
            Operator::Exists => include.push(req),
            Operator::DoesNotExist => exclude.push(req),
            other => return Err(ScopeError::UnsupportedOperator(other)),
        }
    }

    let scoped = instances
        .iter()
        .filter(|instance| {
            let set = BTreeMap::from([(instance.namespace.clone(), String::new())]);

            let included = include.is_empty() || include.iter().any(|req| req.matches(&set));
            let excluded = exclude.iter().any(|req| !req.matches(&set));

            included && !excluded
        })
        .cloned()
        .collect();

    Ok(scoped)
}

/// Drop instances that already have a deletion timestamp.
pub fn filter_terminating(instances: &[Instance]) -> Vec<Instance> {
    instances
        .iter()
        .filter(|instance| !instance.is_terminating())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pods(fleet: &[(&str, &str)]) -> Vec<Instance> {
        fleet.iter().map(|(ns, name)| Instance::new(*ns, *name)).collect()
    }

    fn names(instances: &[Instance]) -> Vec<String> {
        instances.iter().map(ToString::to_string).collect()
    }

    fn scope(input: &str) -> ScopeSelector {
        ScopeSelector::parse(input).unwrap()
    }

    #[test]
    fn test_empty_selector_is_identity() {
        let input = pods(&[("prod", "a"), ("staging", "b"), ("dev", "c")]);
        let out = filter_by_namespaces(&input, &ScopeSelector::everything()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_single_exists_keeps_only_that_namespace() {
        let input = pods(&[("prod", "a"), ("staging", "b"), ("prod", "c")]);
        let out = filter_by_namespaces(&input, &scope("prod")).unwrap();
        assert_eq!(names(&out), vec!["prod/a", "prod/c"]);
    }

    #[test]
    fn test_multiple_exists_is_a_union() {
        let input = pods(&[("prod", "a"), ("staging", "b"), ("dev", "c")]);
        let out = filter_by_namespaces(&input, &scope("prod,dev")).unwrap();
        assert_eq!(names(&out), vec!["prod/a", "dev/c"]);
    }

    #[test]
    fn test_single_does_not_exist_drops_that_namespace() {
        let input = pods(&[("prod", "a"), ("kube-system", "dns"), ("staging", "b")]);
        let out = filter_by_namespaces(&input, &scope("!kube-system")).unwrap();
        assert_eq!(names(&out), vec!["prod/a", "staging/b"]);
    }

    #[test]
    fn test_two_does_not_exist_requirements_drop_both_namespaces() {
        let input = pods(&[
            ("prod", "a"),
            ("kube-system", "dns"),
            ("monitoring", "prom"),
            ("staging", "b"),
        ]);
        let out = filter_by_namespaces(&input, &scope("!kube-system,!monitoring")).unwrap();
        assert_eq!(names(&out), vec!["prod/a", "staging/b"]);
    }

    #[test]
    fn test_exclude_overrides_include() {
        let input = pods(&[("prod", "a"), ("staging", "b")]);
        let out = filter_by_namespaces(&input, &scope("prod,!prod")).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_unsupported_operator_fails_whole_call() {
        let input = pods(&[("prod", "a")]);
        for expr in ["prod=x", "prod in (a)", "prod!=x", "prod>1"] {
            let err = filter_by_namespaces(&input, &scope(expr)).unwrap_err();
            assert!(
                matches!(err, ScopeError::UnsupportedOperator(_)),
                "{expr}: {err:?}"
            );
        }
    }

    #[test]
    fn test_filters_do_not_mutate_input() {
        let input = pods(&[("prod", "a"), ("staging", "b")]);
        let before = input.clone();
        let _ = filter_by_namespaces(&input, &scope("prod")).unwrap();
        let _ = filter_terminating(&input);
        assert_eq!(input, before);
    }

    #[test]
    fn test_terminating_instances_never_pass() {
        let now = Utc::now();
        let input = vec![
            Instance::new("prod", "a").terminating_since(now),
            Instance::new("prod", "b"),
            Instance::new("prod", "c").terminating_since(now),
            Instance::new("prod", "d"),
            Instance::new("prod", "e").terminating_since(now),
        ];
        let out = filter_terminating(&input);
        assert_eq!(names(&out), vec!["prod/b", "prod/d"]);
        assert!(out.iter().all(|i| !i.is_terminating()));
    }
}
