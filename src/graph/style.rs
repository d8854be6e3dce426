//! Node typing and coloring: the product type palette and the ordered
//! rule table used to type virtual nodes.

/// Fallback color for unknown types and the untyped virtual fallback.
pub const DEFAULT_COLOR: &str = "#95a5a6";

/// Type tag used for virtual nodes no rule matches.
pub const DEFAULT_VIRTUAL_TYPE: &str = "integration";

/// Color for a product node type. Unknown types get [`DEFAULT_COLOR`].
pub fn product_color(node_type: &str) -> &'static str {
    match node_type {
        "medidores" => "#00ff88",
        "remotas" => "#ff6b6b",
        "software" => "#4ecdc4",
        "mdc" => "#45b7d1",
        "integracao" => "#f7b731",
        "hardwares" => "#5f27cd",
        _ => DEFAULT_COLOR,
    }
}

/// What a virtual-typing rule matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatch {
    /// Literal prefix of the target identifier.
    IdPrefix(String),
    /// Exact name of the relationship field that produced the edge.
    RelationType(String),
}

/// One entry of the virtual-node typing table: first match wins.
#[derive(Debug, Clone)]
pub struct VirtualRule {
    pub matcher: RuleMatch,
    pub node_type: String,
    pub color: String,
}

impl VirtualRule {
    pub fn id_prefix(prefix: &str, node_type: &str, color: &str) -> Self {
        Self {
            matcher: RuleMatch::IdPrefix(prefix.to_string()),
            node_type: node_type.to_string(),
            color: color.to_string(),
        }
    }

    pub fn relation(relation_type: &str, node_type: &str, color: &str) -> Self {
        Self {
            matcher: RuleMatch::RelationType(relation_type.to_string()),
            node_type: node_type.to_string(),
            color: color.to_string(),
        }
    }

    pub fn matches(&self, target_id: &str, relationship_type: &str) -> bool {
        match &self.matcher {
            RuleMatch::IdPrefix(prefix) => target_id.starts_with(prefix.as_str()),
            RuleMatch::RelationType(name) => relationship_type == name,
        }
    }
}

/// Default rule table covering the naming conventions of the PIM data:
/// MDC / NIC / remote-unit / integration identifier prefixes, then the
/// relationship fields that imply a semantic category.
pub fn default_virtual_rules() -> Vec<VirtualRule> {
    vec![
        VirtualRule::id_prefix("mdc_", "mdc", "#45b7d1"),
        VirtualRule::relation("mdcs", "mdc", "#45b7d1"),
        VirtualRule::id_prefix("nic_", "nic", "#f7b731"),
        VirtualRule::relation("nics", "nic", "#f7b731"),
        VirtualRule::id_prefix("rs", "remota", "#ff6b6b"),
        VirtualRule::relation("remotas", "remota", "#ff6b6b"),
        VirtualRule::id_prefix("int_", "integration", "#a55eea"),
        VirtualRule::relation("tipo_integracao", "integration", "#a55eea"),
        VirtualRule::relation("protocolo", "protocolo", "#26de81"),
        VirtualRule::relation("protocolos", "protocolo", "#26de81"),
        VirtualRule::relation("protocolo_comunicao", "protocolo", "#26de81"),
        VirtualRule::relation("comunicacao", "comunicacao", "#fd79a8"),
        VirtualRule::relation("hemera", "hemera", "#00cec9"),
        VirtualRule::relation("modulos_hemera", "hemera", "#00cec9"),
        VirtualRule::relation("caracteristicas", "caracteristica", "#f7b731"),
        VirtualRule::relation("caractersticas_medidor", "caracteristica", "#f7b731"),
        VirtualRule::relation("mobii", "caracteristica", "#f7b731"),
    ]
}

/// Resolve (type, color) for a virtual node from the rule table.
pub fn resolve_virtual_type<'a>(
    rules: &'a [VirtualRule],
    target_id: &str,
    relationship_type: &str,
) -> (&'a str, &'a str) {
    for rule in rules {
        if rule.matches(target_id, relationship_type) {
            return (&rule.node_type, &rule.color);
        }
    }
    (DEFAULT_VIRTUAL_TYPE, DEFAULT_COLOR)
}
