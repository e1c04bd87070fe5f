use crate::instance::Status;
use crate::space::InstanceSpace;
use crate::Dependency;
use bytes::Bytes;
use std::cmp;
use std::collections::{BTreeSet, HashMap};

/// Committed-but-unexecuted instances, retired in dependency order.
///
/// Every committed instance becomes a vertex; its dependency set supplies
/// the outgoing edges. A vertex may execute once everything reachable from
/// it is committed. Strongly connected components of that subgraph execute
/// as a unit, components in reverse topological order and members inside a
/// component ordered by `(seq, replica)`.
pub(crate) struct ExecGraph {
    vertices: BTreeSet<Dependency>,
}

impl ExecGraph {
    pub fn new() -> ExecGraph {
        ExecGraph { vertices: BTreeSet::new() }
    }

    /// Registers a freshly committed instance as executable
    pub fn offer(&mut self, id: Dependency) {
        self.vertices.insert(id);
    }

    /// Executes every vertex whose dependency closure is fully committed,
    /// marking the instances executed and returning their commands in
    /// execution order. Vertices blocked on an uncommitted dependency are
    /// kept for a later drain.
    pub fn drain(&mut self, space: &mut InstanceSpace) -> Vec<Bytes> {
        let mut executed = Vec::new();

        let roots: Vec<Dependency> = self.vertices.iter().cloned().collect();
        for root in roots {
            // retired while executing an earlier root's components
            if !self.vertices.contains(&root) {
                continue;
            }

            let components = match Tarjan::run(space, root) {
                Some(components) => components,
                None => {
                    trace!("execution of {:?} blocked on an uncommitted dependency", root);
                    continue;
                }
            };

            for mut component in components {
                component.sort_by(|&a, &b| {
                    let (a, b) = (space.get(a).unwrap(), space.get(b).unwrap());
                    if a.executes_before(b) {
                        cmp::Ordering::Less
                    } else if b.executes_before(a) {
                        cmp::Ordering::Greater
                    } else {
                        cmp::Ordering::Equal
                    }
                });

                for id in component {
                    let inst = space.get_mut(id).unwrap();
                    inst.assert_status(&[Status::Committed]);
                    inst.status = Status::Executed;
                    debug!("executing {:?} with seq {}", id, inst.seq);
                    executed.push(inst.command.clone().expect("committed instance without a command"));
                    self.vertices.remove(&id);
                }
            }
        }

        executed
    }
}

/// One Tarjan pass over the committed subgraph reachable from a root.
///
/// Components come out in completion order, which for this edge direction
/// means dependencies before their dependents. The pass gives up with
/// `None` as soon as it reaches coordinates that are not committed yet.
struct Tarjan<'a> {
    space: &'a InstanceSpace,
    index: HashMap<Dependency, usize>,
    lowlink: HashMap<Dependency, usize>,
    stack: Vec<Dependency>,
    components: Vec<Vec<Dependency>>,
}

impl<'a> Tarjan<'a> {
    fn run(space: &'a InstanceSpace, root: Dependency) -> Option<Vec<Vec<Dependency>>> {
        let mut tarjan = Tarjan {
            space,
            index: HashMap::new(),
            lowlink: HashMap::new(),
            stack: Vec::new(),
            components: Vec::new(),
        };
        tarjan.visit(root)?;
        Some(tarjan.components)
    }

    fn visit(&mut self, v: Dependency) -> Option<()> {
        let idx = self.index.len();
        self.index.insert(v, idx);
        self.lowlink.insert(v, idx);
        self.stack.push(v);

        let deps = self.space.get(v).unwrap().deps.to_vec();
        for w in deps {
            assert!(w != v, "instance {:?} depends on itself", v);

            let status = match self.space.get(w) {
                Some(inst) => inst.status,
                // unknown coordinates cannot be committed yet
                None => return None,
            };
            if status == Status::Executed {
                // edge already satisfied
                continue;
            }
            if status < Status::Committed {
                return None;
            }

            if !self.index.contains_key(&w) {
                self.visit(w)?;
                let low = cmp::min(self.lowlink[&v], self.lowlink[&w]);
                self.lowlink.insert(v, low);
            } else if self.stack.contains(&w) {
                let low = cmp::min(self.lowlink[&v], self.index[&w]);
                self.lowlink.insert(v, low);
            }
        }

        if self.lowlink[&v] == self.index[&v] {
            let at = self.stack.iter().rposition(|&x| x == v).unwrap();
            self.components.push(self.stack.split_off(at));
        }
        Some(())
    }
}
