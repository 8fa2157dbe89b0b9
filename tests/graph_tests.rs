use ormgraph::algo::{connected_components, find_cycles_limited, topological_sort};
use ormgraph::graph::{ForeignKeyGraph, GraphView, NavigationGraph, deletion_order, dependency_order};
use ormgraph::metadata::{EntityId, Model, ValueType};
use ormgraph::{ModelBuilder, OrmGraphError};
use proptest::prelude::*;

#[derive(Debug)]
struct Edges {
    count: u32,
    edges: Vec<(u32, u32)>,
}

impl GraphView for Edges {
    type Vertex = u32;

    fn vertices(&self) -> Vec<u32> {
        (0..self.count).collect()
    }

    fn outgoing_neighbours(&self, vertex: u32) -> Vec<u32> {
        self.edges.iter().filter(|(a, _)| *a == vertex).map(|(_, b)| *b).collect()
    }

    fn incoming_neighbours(&self, vertex: u32) -> Vec<u32> {
        self.edges.iter().filter(|(_, b)| *b == vertex).map(|(a, _)| *a).collect()
    }

    fn vertex_label(&self, vertex: u32) -> String {
        format!("n{vertex}")
    }
}

/// Edges only run from a lower to a higher vertex, so the graph is acyclic.
fn dag() -> impl Strategy<Value = Edges> {
    (2u32..12).prop_flat_map(|count| {
        proptest::collection::vec((0..count, 0..count), 0..30).prop_map(move |pairs| Edges {
            count,
            edges: pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect(),
        })
    })
}

proptest! {
    #[test]
    fn prop_topological_order_respects_every_edge(graph in dag()) {
        let order = topological_sort(&graph).expect("acyclic");
        prop_assert_eq!(order.len(), graph.count as usize);
        let position = |v: u32| order.iter().position(|x| *x == v).expect("vertex");
        for (from, to) in &graph.edges {
            prop_assert!(position(*from) < position(*to));
        }
        prop_assert!(find_cycles_limited(&graph, 4).is_empty());
        prop_assert_eq!(topological_sort(&graph).expect("acyclic"), order);
    }

    #[test]
    fn prop_back_edge_creates_reported_cycle(graph in dag()) {
        prop_assume!(!graph.edges.is_empty());
        let (from, to) = graph.edges[0];
        let mut cyclic = Edges { count: graph.count, edges: graph.edges.clone() };
        cyclic.edges.push((to, from));
        match topological_sort(&cyclic) {
            Err(OrmGraphError::CyclicDependency(labels)) => {
                let from_label = format!("n{from}");
                let to_label = format!("n{to}");
                prop_assert!(labels.contains(&from_label));
                prop_assert!(labels.contains(&to_label));
            }
            other => prop_assert!(false, "expected cycle, got {:?}", other),
        }
        prop_assert!(!find_cycles_limited(&cyclic, 1).is_empty());
    }
}

fn entity(builder: &mut ModelBuilder, name: &str) -> EntityId {
    let id = builder.entity(name).expect("entity");
    builder.property(id, "Id", ValueType::Int32).expect("id");
    id
}

fn names(model: &Model, ids: &[EntityId]) -> Vec<String> {
    ids.iter()
        .map(|id| model.entity(*id).expect("entity").name.clone())
        .collect()
}

#[test]
fn test_principals_come_before_dependents() {
    let mut builder = ModelBuilder::default();
    let customer = entity(&mut builder, "Customer");
    let order = entity(&mut builder, "Order");
    let line = entity(&mut builder, "OrderLine");
    let product = entity(&mut builder, "Product");
    builder
        .relationship(order, customer, Some("Customer"), Some("Orders"), true)
        .expect("order -> customer");
    builder
        .relationship(line, order, Some("Order"), Some("Lines"), true)
        .expect("line -> order");
    builder
        .relationship(line, product, Some("Product"), None, true)
        .expect("line -> product");
    let model = builder.build().expect("model");

    let order_ids = dependency_order(&model).expect("acyclic");
    assert_eq!(
        names(&model, &order_ids),
        vec!["Customer", "Order", "Product", "OrderLine"]
    );
    let deletion = deletion_order(&model).expect("acyclic");
    assert_eq!(
        names(&model, &deletion),
        vec!["OrderLine", "Product", "Order", "Customer"]
    );
}

#[test]
fn test_mutual_references_are_reported_as_cycle() {
    let mut builder = ModelBuilder::default();
    let alpha = entity(&mut builder, "Alpha");
    let beta = entity(&mut builder, "Beta");
    let gamma = entity(&mut builder, "Gamma");
    builder
        .relationship(alpha, beta, Some("Beta"), None, false)
        .expect("alpha -> beta");
    builder
        .relationship(beta, alpha, Some("Alpha"), None, false)
        .expect("beta -> alpha");
    builder
        .relationship(gamma, alpha, Some("Alpha"), None, false)
        .expect("gamma -> alpha");
    let model = builder.build().expect("model");

    match dependency_order(&model) {
        Err(OrmGraphError::CyclicDependency(labels)) => {
            assert_eq!(labels, vec!["Alpha".to_string(), "Beta".to_string()]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn test_self_reference_does_not_block_ordering() {
    let mut builder = ModelBuilder::default();
    let employee = entity(&mut builder, "Employee");
    builder
        .relationship(employee, employee, Some("Manager"), Some("Reports"), false)
        .expect("manager");
    let model = builder.build().expect("model");
    assert_eq!(dependency_order(&model).expect("order"), vec![employee]);
    assert!(ForeignKeyGraph::new(&model).outgoing_neighbours(employee).is_empty());
}

#[test]
fn test_table_graph_projects_onto_roots() {
    let mut builder = ModelBuilder::default();
    let animal = entity(&mut builder, "Animal");
    let cat = builder.entity("Cat").expect("cat");
    builder.base_type(cat, Some(animal)).expect("base");
    let owner = entity(&mut builder, "Owner");
    builder
        .relationship(cat, owner, Some("Owner"), None, false)
        .expect("cat -> owner");
    let model = builder.build().expect("model");

    let per_entity = topological_sort(&ForeignKeyGraph::new(&model)).expect("entities");
    assert_eq!(per_entity, vec![animal, owner, cat]);

    let tables = ForeignKeyGraph::by_table(&model);
    assert_eq!(tables.vertices(), vec![animal, owner]);
    assert_eq!(tables.outgoing_neighbours(owner), vec![animal]);
    assert_eq!(topological_sort(&tables).expect("tables"), vec![owner, animal]);
}

#[test]
fn test_navigation_graph_follows_both_directions() {
    let mut builder = ModelBuilder::default();
    let customer = entity(&mut builder, "Customer");
    let order = entity(&mut builder, "Order");
    let note = entity(&mut builder, "Note");
    builder
        .relationship(order, customer, Some("Customer"), Some("Orders"), false)
        .expect("relationship");
    let model = builder.build().expect("model");
    let graph = NavigationGraph::new(&model);

    let edges = graph.outgoing_edges(customer);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].to, order);
    assert_eq!(model.navigation(edges[0].navigation).expect("nav").name, "Orders");
    assert_eq!(graph.outgoing_neighbours(order), vec![customer]);
    assert_eq!(graph.incoming_neighbours(customer), vec![order]);
    assert_eq!(graph.vertex_label(note), "Note");

    let components = connected_components(&graph);
    assert_eq!(components.len(), 2);
    assert!(components.contains(&vec![note]));
}
