//! Which renames force other renames.
//!
//! Each group of classes (normally one namespace) is a node. Group `N` pulls in
//! group `J` when some class already in the closure of `N` references a class
//! that `J` contains. The closure is the fixpoint of that rule.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};

use crate::graph::Jar;

/// A concrete class-level reference that pulled a group into a closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reason {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Closure {
    pub jar: String,
    /// Groups in the closure in discovery order, starting with `jar` itself.
    pub affected: Vec<String>,
    /// One witness per group added beyond `jar`.
    pub reasons: Vec<Reason>,
}

impl Closure {
    /// A group that can be renamed without touching any other group.
    pub fn is_simple(&self) -> bool {
        self.affected.len() == 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ranking {
    pub simple: Vec<String>,
    /// Largest closures first.
    pub complex: Vec<Closure>,
}

/// Computes the closure of every jar, in input order.
pub fn analyze(jars: &[Jar]) -> Vec<Closure> {
    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (i, jar) in jars.iter().enumerate() {
        for class in &jar.classes {
            owner.entry(class.name.as_str()).or_insert(i);
        }
    }
    (0..jars.len()).map(|start| closure_of(jars, &owner, start)).collect()
}

fn closure_of(jars: &[Jar], owner: &HashMap<&str, usize>, start: usize) -> Closure {
    let mut included = vec![false; jars.len()];
    included[start] = true;
    let mut affected = vec![jars[start].name.clone()];
    let mut reasons = Vec::new();
    let mut pending = VecDeque::from([start]);

    while let Some(current) = pending.pop_front() {
        for class in &jars[current].classes {
            for reference in &class.references {
                let Some(&target) = owner.get(reference.as_str()) else {
                    continue;
                };
                if included[target] {
                    continue;
                }
                included[target] = true;
                affected.push(jars[target].name.clone());
                reasons.push(Reason {
                    from: class.name.clone(),
                    to: reference.clone(),
                });
                pending.push_back(target);
            }
        }
    }

    Closure {
        jar: jars[start].name.clone(),
        affected,
        reasons,
    }
}

/// Separates simple groups from complex ones, ranking the latter by closure
/// size and then by name.
pub fn rank(closures: Vec<Closure>) -> Ranking {
    let (simple, mut complex): (Vec<_>, Vec<_>) =
        closures.into_iter().partition(Closure::is_simple);
    complex.sort_by(|a, b| {
        b.affected
            .len()
            .cmp(&a.affected.len())
            .then_with(|| a.jar.cmp(&b.jar))
    });
    Ranking {
        simple: simple.into_iter().map(|c| c.jar).collect(),
        complex,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ClassRecord;

    fn jar(name: &str, classes: &[(&str, &[&str])]) -> Jar {
        Jar {
            name: name.to_string(),
            classes: classes
                .iter()
                .map(|(class, refs)| ClassRecord {
                    name: class.to_string(),
                    references: refs.iter().map(|r| r.to_string()).collect(),
                })
                .collect(),
        }
    }

    fn chain() -> Vec<Jar> {
        vec![
            jar("n1", &[("n1.A", &["n2.B", "java.lang.Object"])]),
            jar("n2", &[("n2.B", &["n3.C"])]),
            jar("n3", &[("n3.C", &["java.lang.String"])]),
        ]
    }

    #[test]
    fn closure_follows_references_transitively() {
        let closures = analyze(&chain());
        assert_eq!(closures[0].affected, vec!["n1", "n2", "n3"]);
        assert_eq!(
            closures[0].reasons,
            vec![
                Reason {
                    from: "n1.A".into(),
                    to: "n2.B".into()
                },
                Reason {
                    from: "n2.B".into(),
                    to: "n3.C".into()
                },
            ]
        );
        assert_eq!(closures[1].affected, vec!["n2", "n3"]);
        assert_eq!(closures[2].affected, vec!["n3"]);
        assert!(closures[2].is_simple());
        assert!(closures[2].reasons.is_empty());
    }

    #[test]
    fn cycles_terminate() {
        let jars = vec![
            jar("x", &[("x.A", &["y.B", "x.A"])]),
            jar("y", &[("y.B", &["x.A"])]),
        ];
        let closures = analyze(&jars);
        assert_eq!(closures[0].affected, vec!["x", "y"]);
        assert_eq!(closures[1].affected, vec!["y", "x"]);
        assert_eq!(closures[0].reasons.len(), 1);
    }

    #[test]
    fn ranking_orders_complex_by_size() {
        let ranking = rank(analyze(&chain()));
        assert_eq!(ranking.simple, vec!["n3"]);
        let order: Vec<_> = ranking.complex.iter().map(|c| c.jar.as_str()).collect();
        assert_eq!(order, vec!["n1", "n2"]);
    }

    #[test]
    fn empty_input_has_no_closures() {
        assert!(analyze(&[]).is_empty());
        assert_eq!(rank(Vec::new()), Ranking::default());
    }
}
