//! In-memory host tree that records every operation, for tests.

use std::fmt::Write as _;

use indexmap::IndexMap;

use super::HostTree;
use crate::error::HostError;
use crate::types::{Event, EventHandler, PropValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeRef(pub(crate) usize);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Op {
    Create(String),
    CreateText(String),
    SetProperty(NodeRef, String),
    RemoveProperty(NodeRef, String),
    SetText(NodeRef, String),
    AddListener(NodeRef, String),
    RemoveListener(NodeRef, String),
    Insert { parent: NodeRef, child: NodeRef, before: Option<NodeRef> },
    Remove(NodeRef),
    Release(NodeRef),
}

impl Op {
    /// Whether this operation changes the tree (as opposed to building a detached node).
    pub(crate) fn is_mutation(&self) -> bool {
        !matches!(self, Op::Create(_) | Op::CreateText(_) | Op::Release(_))
    }
}

enum Data {
    Element {
        tag: String,
        props: IndexMap<String, PropValue>,
        listeners: Vec<(String, EventHandler)>,
    },
    Text(String),
}

struct Node {
    data: Data,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
}

pub(crate) struct RecordingHost {
    nodes: Vec<Node>,
    pub(crate) ops: Vec<Op>,
    /// Property name `set_property` refuses.
    pub(crate) reject_property: Option<String>,
}

impl RecordingHost {
    pub(crate) fn new() -> Self {
        let root = Node {
            data: Data::Element { tag: "root".into(), props: IndexMap::new(), listeners: Vec::new() },
            parent: None,
            children: Vec::new(),
        };
        Self { nodes: vec![root], ops: Vec::new(), reject_property: None }
    }

    pub(crate) fn root(&self) -> NodeRef {
        NodeRef(0)
    }

    /// Forget the log so far.
    pub(crate) fn take_ops(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.ops)
    }

    pub(crate) fn mutations(&self) -> Vec<&Op> {
        self.ops.iter().filter(|op| op.is_mutation()).collect()
    }

    pub(crate) fn children(&self, node: NodeRef) -> &[NodeRef] {
        &self.nodes[node.0].children
    }

    pub(crate) fn listener_count(&self, node: NodeRef) -> usize {
        match &self.nodes[node.0].data {
            Data::Element { listeners, .. } => listeners.len(),
            Data::Text(_) => 0,
        }
    }

    /// First attached element with `tag`, depth-first from the root.
    pub(crate) fn find(&self, tag: &str) -> Option<NodeRef> {
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            if let Data::Element { tag: t, .. } = &self.nodes[node.0].data {
                if t == tag && node != self.root() {
                    return Some(node);
                }
            }
            stack.extend(self.nodes[node.0].children.iter().rev().copied());
        }
        None
    }

    /// Invoke every listener bound for `event` on `node`.
    pub(crate) fn dispatch(&self, node: NodeRef, event: &str) {
        let Data::Element { listeners, .. } = &self.nodes[node.0].data else { return };
        let handlers: Vec<EventHandler> = listeners
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler.call(&Event::new(event));
        }
    }

    /// Serialize the attached tree under the root.
    pub(crate) fn html(&self) -> String {
        let mut out = String::new();
        for &child in &self.nodes[0].children {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, node: NodeRef, out: &mut String) {
        let node = &self.nodes[node.0];
        match &node.data {
            Data::Text(text) => out.push_str(text),
            Data::Element { tag, props, .. } => {
                let _ = write!(out, "<{tag}");
                for (key, value) in props {
                    let _ = write!(out, " {key}=\"{value}\"");
                }
                out.push('>');
                for &child in &node.children {
                    self.write_node(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn push(&mut self, data: Data) -> NodeRef {
        self.nodes.push(Node { data, parent: None, children: Vec::new() });
        NodeRef(self.nodes.len() - 1)
    }

    fn detach(&mut self, node: NodeRef) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    fn element_mut(&mut self, node: NodeRef) -> Result<(&mut IndexMap<String, PropValue>, &mut Vec<(String, EventHandler)>), HostError> {
        match &mut self.nodes[node.0].data {
            Data::Element { props, listeners, .. } => Ok((props, listeners)),
            Data::Text(_) => Err(HostError::new("not an element")),
        }
    }
}

impl HostTree for RecordingHost {
    type Node = NodeRef;

    fn contains(&self, node: &NodeRef) -> bool {
        node.0 < self.nodes.len()
    }

    fn create_element(&mut self, tag: &str) -> Result<NodeRef, HostError> {
        self.ops.push(Op::Create(tag.to_string()));
        Ok(self.push(Data::Element { tag: tag.to_string(), props: IndexMap::new(), listeners: Vec::new() }))
    }

    fn create_text(&mut self, text: &str) -> Result<NodeRef, HostError> {
        self.ops.push(Op::CreateText(text.to_string()));
        Ok(self.push(Data::Text(text.to_string())))
    }

    fn set_property(&mut self, node: &NodeRef, name: &str, value: &PropValue) -> Result<(), HostError> {
        if self.reject_property.as_deref() == Some(name) {
            return Err(HostError::new(format!("unsupported property '{name}'")));
        }
        self.ops.push(Op::SetProperty(*node, name.to_string()));
        let (props, _) = self.element_mut(*node)?;
        props.insert(name.to_string(), value.clone());
        Ok(())
    }

    fn remove_property(&mut self, node: &NodeRef, name: &str) -> Result<(), HostError> {
        self.ops.push(Op::RemoveProperty(*node, name.to_string()));
        let (props, _) = self.element_mut(*node)?;
        props.shift_remove(name);
        Ok(())
    }

    fn set_text(&mut self, node: &NodeRef, text: &str) -> Result<(), HostError> {
        self.ops.push(Op::SetText(*node, text.to_string()));
        match &mut self.nodes[node.0].data {
            Data::Text(value) => {
                *value = text.to_string();
                Ok(())
            }
            Data::Element { .. } => Err(HostError::new("not a text node")),
        }
    }

    fn add_listener(&mut self, node: &NodeRef, event: &str, handler: &EventHandler) -> Result<(), HostError> {
        self.ops.push(Op::AddListener(*node, event.to_string()));
        let (_, listeners) = self.element_mut(*node)?;
        listeners.push((event.to_string(), handler.clone()));
        Ok(())
    }

    fn remove_listener(&mut self, node: &NodeRef, event: &str, handler: &EventHandler) -> Result<(), HostError> {
        self.ops.push(Op::RemoveListener(*node, event.to_string()));
        let (_, listeners) = self.element_mut(*node)?;
        listeners.retain(|(name, h)| !(name == event && h == handler));
        Ok(())
    }

    fn insert_before(&mut self, parent: &NodeRef, child: &NodeRef, before: Option<&NodeRef>) -> Result<(), HostError> {
        self.ops.push(Op::Insert { parent: *parent, child: *child, before: before.copied() });
        self.detach(*child);

        let siblings = &mut self.nodes[parent.0].children;
        let position = match before {
            Some(before) => siblings
                .iter()
                .position(|c| c == before)
                .ok_or_else(|| HostError::new("reference node is not a child of parent"))?,
            None => siblings.len(),
        };
        siblings.insert(position, *child);
        self.nodes[child.0].parent = Some(*parent);
        Ok(())
    }

    fn remove(&mut self, node: &NodeRef) -> Result<(), HostError> {
        self.ops.push(Op::Remove(*node));
        self.detach(*node);
        Ok(())
    }

    fn release(&mut self, node: &NodeRef) {
        self.ops.push(Op::Release(*node));
    }
}
