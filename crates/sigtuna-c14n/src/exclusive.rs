#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Only "visibly utilized" namespace declarations are output. A namespace is
//! visibly utilized by an element if:
//! 1. its prefix is used by the element's tag name, or
//! 2. its prefix is used by one of the element's attributes, or
//! 3. the prefix appears in the InclusiveNamespaces PrefixList.
//!
//! A declaration is emitted only if the nearest output ancestor did not
//! already render the same binding.

use crate::escape;
use crate::render::{Attr, NsDecl};
use roxmltree::{Attribute, Document, Node, NodeType};
use sigtuna_core::Error;
use sigtuna_xml::NodeSet;
use std::collections::{BTreeMap, HashSet};

/// Canonicalize using Exclusive C14N 1.0.
pub fn canonicalize(
    doc: &Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let ctx = ExcC14nContext {
        input: doc.input_text(),
        with_comments,
        node_set,
        inclusive_prefixes: inclusive_prefixes
            .iter()
            .map(|p| if p == "#default" { String::new() } else { p.clone() })
            .collect(),
    };
    let mut output = Vec::new();
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct ExcC14nContext<'a> {
    input: &'a str,
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    /// PrefixList entries, with `#default` mapped to "".
    inclusive_prefixes: HashSet<String>,
}

impl ExcC14nContext<'_> {
    fn is_visible(&self, node: Node<'_, '_>) -> bool {
        self.node_set.map_or(true, |ns| ns.contains(node))
    }

    fn process_node(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, rendered_ns)?;
                }
            }
            NodeType::Element => self.process_element(node, output, rendered_ns)?,
            NodeType::Text => {
                if self.is_visible(node) {
                    escape::write_text(output, node.text().unwrap_or(""));
                }
            }
            NodeType::Comment => {
                if self.with_comments && self.is_visible(node) {
                    self.top_level_separator_before(node, output);
                    output.extend_from_slice(b"<!--");
                    output.extend_from_slice(node.text().unwrap_or("").as_bytes());
                    output.extend_from_slice(b"-->");
                    self.top_level_separator_after(node, output);
                }
            }
            NodeType::PI => {
                if let (true, Some(pi)) = (self.is_visible(node), node.pi()) {
                    self.top_level_separator_before(node, output);
                    output.extend_from_slice(b"<?");
                    output.extend_from_slice(pi.target.as_bytes());
                    if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
                        output.push(b' ');
                        escape::write_pi(output, value);
                    }
                    output.extend_from_slice(b"?>");
                    self.top_level_separator_after(node, output);
                }
            }
        }
        Ok(())
    }

    fn process_element(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        if !self.is_visible(node) {
            // Declarations are only rendered on visible start tags; an
            // invisible element passes its ancestors' context straight through.
            for child in node.children() {
                self.process_node(child, output, rendered_ns)?;
            }
            return Ok(());
        }

        let qname = self.element_qname(node)?;
        let elem_prefix = qname.split_once(':').map_or("", |(p, _)| p);

        let mut utilized: HashSet<String> = HashSet::new();
        utilized.insert(elem_prefix.to_owned());

        let mut attrs: Vec<Attr> = Vec::new();
        for attr in node.attributes() {
            let ns_uri = attr.namespace().unwrap_or("");
            let qualified_name = if ns_uri.is_empty() {
                attr.name().to_owned()
            } else {
                let qname = self.attr_qname(&attr)?;
                if let Some((prefix, _)) = qname.split_once(':') {
                    utilized.insert(prefix.to_owned());
                }
                qname.to_owned()
            };
            attrs.push(Attr {
                ns_uri: ns_uri.to_owned(),
                local_name: attr.name().to_owned(),
                qualified_name,
                value: attr.value().to_owned(),
            });
        }
        attrs.sort();

        utilized.extend(self.inclusive_prefixes.iter().cloned());

        let inscope = inscope_namespaces(node);
        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for prefix in &utilized {
            if prefix == "xml" {
                continue;
            }
            match inscope.get(prefix) {
                Some(uri) => {
                    if rendered_ns.get(prefix) != Some(uri) {
                        ns_decls.push(NsDecl { prefix: prefix.clone(), uri: uri.clone() });
                    }
                }
                None if prefix.is_empty() => {
                    // The element is in no namespace but an output ancestor
                    // rendered a default namespace: undeclare it.
                    if rendered_ns.get("").is_some_and(|uri| !uri.is_empty()) {
                        ns_decls.push(NsDecl { prefix: String::new(), uri: String::new() });
                    }
                }
                None => {}
            }
        }
        ns_decls.sort();

        output.push(b'<');
        output.extend_from_slice(qname.as_bytes());
        for decl in &ns_decls {
            decl.write_to(output);
        }
        for attr in &attrs {
            attr.write_to(output);
        }
        output.push(b'>');

        let mut child_rendered_ns = rendered_ns.clone();
        for decl in ns_decls {
            child_rendered_ns.insert(decl.prefix, decl.uri);
        }

        for child in node.children() {
            self.process_node(child, output, &child_rendered_ns)?;
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(qname.as_bytes());
        output.push(b'>');
        Ok(())
    }

    /// The element's qualified name exactly as written in the source.
    ///
    /// roxmltree resolves prefixes away, so the name is read back from the
    /// start tag's byte range.
    fn element_qname<'t>(&'t self, node: Node<'_, '_>) -> Result<&'t str, Error> {
        let start = node.range().start;
        let tag = self
            .input
            .get(start..)
            .and_then(|s| s.strip_prefix('<'))
            .ok_or_else(|| Error::Canonicalization("element range out of bounds".into()))?;
        let end = tag
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(tag.len());
        let qname = &tag[..end];
        let local = qname.split_once(':').map_or(qname, |(_, l)| l);
        if local != node.tag_name().name() {
            return Err(Error::Canonicalization(format!(
                "start tag does not match element {}",
                node.tag_name().name()
            )));
        }
        Ok(qname)
    }

    /// A namespaced attribute's qualified name as written in the source.
    ///
    /// Several prefixes may be bound to the same URI, so the prefix cannot be
    /// recovered from the resolved name.
    fn attr_qname<'t>(&'t self, attr: &Attribute<'_, '_>) -> Result<&'t str, Error> {
        let qname = self
            .input
            .get(attr.range_qname())
            .ok_or_else(|| Error::Canonicalization("attribute range out of bounds".into()))?;
        match qname.split_once(':') {
            Some((_, local)) if local == attr.name() => Ok(qname),
            _ => Err(Error::Canonicalization(format!(
                "no prefix bound for attribute {}",
                attr.name()
            ))),
        }
    }

    /// Document-level comments and PIs are separated from the root element by a newline.
    fn top_level_separator_before(&self, node: Node<'_, '_>, output: &mut Vec<u8>) {
        if parent_is_root(node) && node.prev_siblings().any(|s| s != node && s.is_element()) {
            output.push(b'\n');
        }
    }

    fn top_level_separator_after(&self, node: Node<'_, '_>, output: &mut Vec<u8>) {
        if parent_is_root(node) && node.next_siblings().any(|s| s != node && s.is_element()) {
            output.push(b'\n');
        }
    }
}

fn parent_is_root(node: Node<'_, '_>) -> bool {
    node.parent().is_some_and(|p| p.node_type() == NodeType::Root)
}

/// All in-scope namespace bindings of an element, keyed by prefix ("" for default).
fn inscope_namespaces(node: Node<'_, '_>) -> BTreeMap<String, String> {
    node.namespaces()
        .filter(|n| !n.uri().is_empty())
        .map(|n| (n.name().unwrap_or("").to_owned(), n.uri().to_owned()))
        .collect()
}
