// src/router/state.rs
use crate::locator::Endpoint;
use crate::selector::SelectionResult;
use crate::strategy::Strategy;
use std::fmt;
use std::sync::Arc;

/// Immutable dispatch rule over one admitted selection.
pub struct RewriteRule {
    selection: Arc<[Endpoint]>,
    strategy: Arc<dyn Strategy>,
}

impl RewriteRule {
    /// `None` for an empty selection; a rule always has somewhere to route.
    pub fn new(selection: Vec<Endpoint>, strategy: Arc<dyn Strategy>) -> Option<Self> {
        if selection.is_empty() {
            return None;
        }
        Some(Self {
            selection: selection.into(),
            strategy,
        })
    }

    pub fn selection(&self) -> &[Endpoint] {
        &self.selection
    }

    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.selection.contains(endpoint)
    }

    /// Endpoint for the next request, as chosen by the strategy.
    pub fn resolve(&self) -> &Endpoint {
        let i = self.strategy.next_index(&self.selection);
        self.selection.get(i).unwrap_or(&self.selection[0])
    }
}

impl fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteRule")
            .field("selection", &self.selection)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

/// The `(result, rule)` pair request handlers read. Published as a whole so a
/// reader never sees one half updated without the other.
#[derive(Debug, Clone, Default)]
pub struct RouterState {
    pub result: Option<Arc<SelectionResult>>,
    pub rule: Option<Arc<RewriteRule>>,
}

#[derive(Debug)]
pub(crate) enum Transition {
    /// New selection; publish with a freshly built rule.
    Install(RouterState),
    /// Publish a new result under the existing rule (or none).
    Replace(RouterState),
    /// Leave the current state untouched.
    Keep,
}

impl RouterState {
    pub fn selection(&self) -> &[Endpoint] {
        self.result
            .as_ref()
            .map(|r| r.selection.as_slice())
            .unwrap_or(&[])
    }

    /// Merge policy applied by the refresh writer.
    pub(crate) fn transition(&self, next: SelectionResult, strategy: &Arc<dyn Strategy>) -> Transition {
        if !next.selection.is_empty() {
            let unchanged = self.rule.is_some()
                && self
                    .result
                    .as_ref()
                    .map_or(false, |current| same_selection(&current.selection, &next.selection));

            if unchanged {
                return Transition::Replace(RouterState {
                    result: Some(Arc::new(next)),
                    rule: self.rule.clone(),
                });
            }

            let rule = RewriteRule::new(next.selection.clone(), Arc::clone(strategy)).map(Arc::new);
            return Transition::Install(RouterState {
                result: Some(Arc::new(next)),
                rule,
            });
        }

        if next.error.is_some() && self.result.is_some() {
            return Transition::Keep;
        }

        Transition::Replace(RouterState {
            result: Some(Arc::new(next)),
            rule: None,
        })
    }
}

/// Element-wise, order-sensitive comparison by endpoint identity.
pub fn same_selection(a: &[Endpoint], b: &[Endpoint]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectionError;
    use crate::strategy::RandomStrategy;

    fn endpoints(urls: &[&str]) -> Vec<Endpoint> {
        urls.iter().map(|u| Endpoint::parse(u).unwrap()).collect()
    }

    fn result(urls: &[&str]) -> SelectionResult {
        SelectionResult::new(endpoints(urls), endpoints(urls))
    }

    fn strategy() -> Arc<dyn Strategy> {
        Arc::new(RandomStrategy::new())
    }

    fn installed(state: &RouterState, next: SelectionResult) -> RouterState {
        match state.transition(next, &strategy()) {
            Transition::Install(state) => state,
            other => panic!("expected install, got {:?}", other),
        }
    }

    #[test]
    fn test_same_selection_is_order_sensitive() {
        let ab = endpoints(&["http://a:1", "http://b:1"]);
        let ba = endpoints(&["http://b:1", "http://a:1"]);
        let a = endpoints(&["http://a:1"]);

        assert!(same_selection(&ab, &ab.clone()));
        assert!(!same_selection(&ab, &ba));
        assert!(!same_selection(&ab, &a));
        assert!(!same_selection(&a, &ab));
    }

    #[test]
    fn test_first_selection_installs_rule() {
        let state = installed(&RouterState::default(), result(&["http://a:1"]));
        assert!(state.rule.is_some());
        assert_eq!(state.selection().len(), 1);
    }

    #[test]
    fn test_unchanged_selection_keeps_rule() {
        let state = installed(&RouterState::default(), result(&["http://a:1", "http://b:1"]));

        match state.transition(result(&["http://a:1", "http://b:1"]), &strategy()) {
            Transition::Replace(next) => {
                assert!(Arc::ptr_eq(
                    next.rule.as_ref().unwrap(),
                    state.rule.as_ref().unwrap()
                ));
                assert!(!Arc::ptr_eq(
                    next.result.as_ref().unwrap(),
                    state.result.as_ref().unwrap()
                ));
            }
            other => panic!("expected replace, got {:?}", other),
        }
    }

    #[test]
    fn test_reordered_selection_installs_rule() {
        let state = installed(&RouterState::default(), result(&["http://a:1", "http://b:1"]));
        installed(&state, result(&["http://b:1", "http://a:1"]));
    }

    #[test]
    fn test_error_keeps_previous_state() {
        let state = installed(&RouterState::default(), result(&["http://a:1"]));
        let failed = SelectionResult::new(vec![], vec![])
            .with_error(SelectionError::Discovery(vec!["down".to_string()]));

        assert!(matches!(state.transition(failed, &strategy()), Transition::Keep));
    }

    #[test]
    fn test_error_without_previous_state_is_adopted() {
        let failed = SelectionResult::new(vec![], vec![])
            .with_error(SelectionError::Discovery(vec!["down".to_string()]));

        match RouterState::default().transition(failed, &strategy()) {
            Transition::Replace(next) => {
                assert!(next.rule.is_none());
                assert!(next.result.unwrap().error.is_some());
            }
            other => panic!("expected replace, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_selection_without_error_clears_rule() {
        let state = installed(&RouterState::default(), result(&["http://a:1"]));

        match state.transition(SelectionResult::new(vec![], vec![]), &strategy()) {
            Transition::Replace(next) => {
                assert!(next.rule.is_none());
                assert!(next.selection().is_empty());
            }
            other => panic!("expected replace, got {:?}", other),
        }
    }
}
