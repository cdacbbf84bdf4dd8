//! API Gateway resource tree built from flat route paths.

use std::collections::HashMap;

use crate::config::{Error, RouteDefinition};
use crate::hcl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    /// The API root resource supplied by the core stack.
    Root,
    Node(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNode {
    pub segment: String,
    /// Segments from the root joined by `/`, without a leading slash.
    pub path: String,
    pub identifier: String,
    pub parent: Parent,
}

/// An HTTP method bound to the node of its route's last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBinding {
    pub method: String,
    pub path: String,
    pub node: NodeId,
}

type SeenNodes = HashMap<String, NodeId>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceTree {
    nodes: Vec<PathNode>,
    bindings: Vec<MethodBinding>,
}

impl ResourceTree {
    /// Fails when two distinct paths normalize to the same identifier, e.g.
    /// `/a-b` and `/a/b`.
    pub fn build(routes: &[RouteDefinition], service_name: &str) -> Result<Self, Error> {
        let mut tree = ResourceTree::default();
        let mut seen = SeenNodes::new();

        for route in routes {
            tree.insert_route(&mut seen, route, service_name)?;
        }

        tracing::debug!(
            service = service_name,
            routes = routes.len(),
            nodes = tree.nodes.len(),
            bindings = tree.bindings.len(),
            "built resource path tree"
        );
        return Ok(tree);
    }

    fn insert_route(
        &mut self,
        seen: &mut SeenNodes,
        route: &RouteDefinition,
        service_name: &str,
    ) -> Result<(), Error> {
        let segments: Vec<&str> = route
            .path
            .trim_start_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        if segments.is_empty() {
            tracing::debug!(
                method = route.method.as_str(),
                path = route.path.as_str(),
                "skipping root route"
            );
            return Ok(());
        }

        let mut parent = Parent::Root;
        let mut cumulative = String::new();
        for segment in segments {
            if !cumulative.is_empty() {
                cumulative.push('/');
            }
            cumulative.push_str(segment);

            let id = match seen.get(&cumulative) {
                Some(id) => *id,
                None => {
                    let identifier = hcl::identifier(&format!("{}_{}", service_name, cumulative));
                    if let Some(owner) = self.nodes.iter().find(|node| node.identifier == identifier) {
                        return Err(Error::InvalidValue(format!(
                            "routes /{} and /{} both map to resource name `{}`",
                            owner.path, cumulative, identifier
                        )));
                    }

                    let id = NodeId(self.nodes.len());
                    self.nodes.push(PathNode {
                        segment: segment.to_string(),
                        path: cumulative.clone(),
                        identifier,
                        parent,
                    });
                    seen.insert(cumulative.clone(), id);
                    id
                }
            };
            parent = Parent::Node(id);
        }

        if let Parent::Node(node) = parent {
            self.bindings.push(MethodBinding {
                method: route.method.to_ascii_uppercase(),
                path: cumulative,
                node,
            });
        }

        return Ok(());
    }

    /// Nodes in creation order; a parent always precedes its children.
    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    pub fn bindings(&self) -> &[MethodBinding] {
        &self.bindings
    }

    pub fn node(&self, id: NodeId) -> &PathNode {
        &self.nodes[id.0]
    }

    pub fn find(&self, path: &str) -> Option<&PathNode> {
        self.nodes.iter().find(|node| node.path == path)
    }

    pub fn parent(&self, node: &PathNode) -> Option<&PathNode> {
        match node.parent {
            Parent::Root => None,
            Parent::Node(id) => Some(self.node(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::Parent;
    use super::ResourceTree;
    use crate::config::Error;
    use crate::config::RouteDefinition;

    fn routes(paths: &[&str]) -> Vec<RouteDefinition> {
        paths
            .iter()
            .map(|path| RouteDefinition::new("GET", path))
            .collect()
    }

    #[test]
    fn shares_common_prefixes() {
        let tree = ResourceTree::build(&routes(&["/a/b", "/a/c"]), "svc").unwrap();

        let paths: Vec<&str> = tree.nodes().iter().map(|node| node.path.as_str()).collect();
        assert_eq!(vec!["a", "a/b", "a/c"], paths);

        let a = tree.find("a").unwrap();
        assert_eq!(Parent::Root, a.parent);
        assert_eq!(a, tree.parent(tree.find("a/b").unwrap()).unwrap());
        assert_eq!(a, tree.parent(tree.find("a/c").unwrap()).unwrap());
        assert_eq!(2, tree.bindings().len());
    }

    #[test]
    fn orders_scenario() {
        let routes = vec![
            RouteDefinition::new("GET", "/orders"),
            RouteDefinition::new("POST", "/orders/items"),
        ];
        let tree = ResourceTree::build(&routes, "orders").unwrap();

        let orders = tree.find("orders").unwrap();
        let items = tree.find("orders/items").unwrap();
        assert_eq!("orders_orders", orders.identifier);
        assert_eq!("orders_orders_items", items.identifier);
        assert_eq!("items", items.segment);
        assert_eq!(Some(orders), tree.parent(items));
        assert_eq!(2, tree.nodes().len());

        let bindings = tree.bindings();
        assert_eq!(2, bindings.len());
        assert_eq!("GET", bindings[0].method);
        assert_eq!(orders, tree.node(bindings[0].node));
        assert_eq!("POST", bindings[1].method);
        assert_eq!("orders/items", bindings[1].path);
        assert_eq!(items, tree.node(bindings[1].node));
    }

    #[test]
    fn skips_root_routes() {
        for path in ["/", "", "//"] {
            let tree = ResourceTree::build(&routes(&[path]), "svc").unwrap();
            assert_eq!(true, tree.nodes().is_empty(), "path {:?}", path);
            assert_eq!(true, tree.bindings().is_empty(), "path {:?}", path);
        }
    }

    #[test]
    fn first_route_owns_the_prefix() {
        let tree = ResourceTree::build(&routes(&["/users/{id}/posts", "/users"]), "blog-api").unwrap();

        let users = tree.find("users").unwrap();
        assert_eq!("blog_api_users", users.identifier);
        assert_eq!(Parent::Root, users.parent);
        assert_eq!("blog_api_users__id__posts", tree.find("users/{id}/posts").unwrap().identifier);
        assert_eq!(3, tree.nodes().len());
        assert_eq!(users, tree.node(tree.bindings()[1].node));
    }

    #[test]
    fn ignores_empty_segments() {
        let tree = ResourceTree::build(&routes(&["/a//b/", "a/b"]), "svc").unwrap();

        let paths: Vec<&str> = tree.nodes().iter().map(|node| node.path.as_str()).collect();
        assert_eq!(vec!["a", "a/b"], paths);
        assert_eq!("a/b", tree.bindings()[0].path);
        assert_eq!(tree.bindings()[0].node, tree.bindings()[1].node);
    }

    #[test]
    fn uppercases_methods() {
        let routes = vec![RouteDefinition::new("delete", "/orders/{id}")];
        let tree = ResourceTree::build(&routes, "orders").unwrap();
        assert_eq!("DELETE", tree.bindings()[0].method);
    }

    #[test]
    fn rejects_paths_with_the_same_identifier() {
        for paths in [&["/a-b", "/a/b"][..], &["/a_b", "/a-b"][..], &["/a/b", "/a_b"][..]] {
            let result = ResourceTree::build(&routes(paths), "svc");
            match result.err().unwrap() {
                Error::InvalidValue(message) => {
                    assert_eq!(true, message.contains("svc_a_b"), "{}", message)
                }
                _ => panic!("Expected `InvalidValue` error"),
            }
        }
    }

    fn route_paths() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(
            prop::collection::vec("[a-c]{1,2}", 0..4).prop_map(|segments| format!("/{}", segments.join("/"))),
            0..10,
        )
    }

    proptest! {
        #[test]
        fn one_node_per_cumulative_path(paths in route_paths()) {
            let routes: Vec<RouteDefinition> = paths.iter().map(|path| RouteDefinition::new("GET", path)).collect();
            let tree = ResourceTree::build(&routes, "svc").unwrap();

            let mut seen = HashSet::new();
            for node in tree.nodes() {
                prop_assert!(seen.insert(node.path.clone()), "duplicate node for {}", node.path);

                let expected_parent = node.path.rsplit_once('/').map(|(prefix, _)| prefix);
                prop_assert_eq!(expected_parent, tree.parent(node).map(|parent| parent.path.as_str()));
            }

            let non_root = paths.iter().filter(|path| path.as_str() != "/").count();
            prop_assert_eq!(non_root, tree.bindings().len());
        }

        #[test]
        fn rebuilding_is_deterministic(paths in route_paths()) {
            let routes: Vec<RouteDefinition> = paths.iter().map(|path| RouteDefinition::new("GET", path)).collect();
            prop_assert_eq!(
                ResourceTree::build(&routes, "svc").unwrap(),
                ResourceTree::build(&routes, "svc").unwrap()
            );
        }
    }
}
