//! Input shapes derived from model definitions
//!
//! For each model the registry derives which filter operators apply to which
//! field, which fields may identify a single row, what can be ordered on, and
//! how create/update payloads are formed. The engine checks every request
//! against these shapes before SQL is generated.

use super::{FieldType, ModelDef, RelationKind};

/// Operator usable inside a scalar field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Equals,
    In,
    NotIn,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    Mode,
    Not,
    IsNull,
}

impl FilterOperator {
    pub fn name(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "notIn",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::Mode => "mode",
            FilterOperator::Not => "not",
            FilterOperator::IsNull => "isNull",
        }
    }

    /// Operators available for a field of the given type
    pub fn for_field(field_type: FieldType, nullable: bool) -> Vec<FilterOperator> {
        use FilterOperator::*;

        let mut ops = match field_type {
            FieldType::String => vec![
                Equals, In, NotIn, Lt, Lte, Gt, Gte, Contains, StartsWith, EndsWith, Mode, Not,
            ],
            FieldType::Int | FieldType::Float | FieldType::DateTime => {
                vec![Equals, In, NotIn, Lt, Lte, Gt, Gte, Not]
            }
            FieldType::Boolean => vec![Equals, Not],
        };
        if nullable {
            ops.push(IsNull);
        }
        ops
    }
}

/// Operator usable on a relation filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationFilterOperator {
    Some,
    Every,
    None,
    Is,
    IsNot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarFilterShape {
    pub field: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
    pub operators: Vec<FilterOperator>,
}

impl ScalarFilterShape {
    pub fn supports(&self, op: FilterOperator) -> bool {
        self.operators.contains(&op)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationFilterShape {
    pub relation: &'static str,
    pub target: &'static str,
    pub operators: Vec<RelationFilterOperator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderShape {
    pub field: &'static str,
    /// Whether NULLS FIRST / NULLS LAST may be requested
    pub nulls_ordering: bool,
}

/// How a field takes part in a create payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateRequirement {
    /// Must be supplied
    Required,
    /// May be omitted, stored as null
    Optional,
    /// May be omitted, filled from the column default
    Defaulted,
    /// Always written by the client (updated-at stamps)
    Generated,
    /// Foreign key: supplied directly or through the relation
    ForeignKey { relation: &'static str, required: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateFieldShape {
    pub field: &'static str,
    pub field_type: FieldType,
    pub requirement: CreateRequirement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationWriteKind {
    Connect,
    Create,
    ConnectMany,
    CreateMany,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationWriteShape {
    pub relation: &'static str,
    pub target: &'static str,
    pub on_create: Vec<RelationWriteKind>,
    pub on_update: Vec<RelationWriteKind>,
}

impl RelationWriteShape {
    pub fn allows(&self, kind: RelationWriteKind, creating: bool) -> bool {
        if creating {
            self.on_create.contains(&kind)
        } else {
            self.on_update.contains(&kind)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateFieldShape {
    pub field: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
    /// increment / decrement / multiply / divide
    pub numeric_operations: bool,
    pub immutable: bool,
}

/// All input shapes for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct InputShapes {
    pub model: &'static str,
    pub filters: Vec<ScalarFilterShape>,
    pub relation_filters: Vec<RelationFilterShape>,
    pub unique_keys: Vec<&'static str>,
    pub order_by: Vec<OrderShape>,
    pub create_fields: Vec<CreateFieldShape>,
    pub update_fields: Vec<UpdateFieldShape>,
    pub relation_writes: Vec<RelationWriteShape>,
}

impl InputShapes {
    /// Shapes for a registered model
    pub fn for_model(registry: &super::SchemaRegistry, name: &str) -> crate::error::Result<Self> {
        registry.get_entity(name).map(Self::derive)
    }

    pub fn derive(model: &ModelDef) -> Self {
        let filters = model
            .fields
            .iter()
            .map(|f| ScalarFilterShape {
                field: f.name,
                field_type: f.field_type,
                nullable: f.nullable,
                operators: FilterOperator::for_field(f.field_type, f.nullable),
            })
            .collect();

        let relation_filters = model
            .relations
            .iter()
            .map(|r| RelationFilterShape {
                relation: r.name,
                target: r.target,
                operators: if r.is_list() {
                    vec![
                        RelationFilterOperator::Some,
                        RelationFilterOperator::Every,
                        RelationFilterOperator::None,
                    ]
                } else {
                    vec![RelationFilterOperator::Is, RelationFilterOperator::IsNot]
                },
            })
            .collect();

        let order_by = model
            .fields
            .iter()
            .map(|f| OrderShape {
                field: f.name,
                nulls_ordering: f.nullable,
            })
            .collect();

        let create_fields = model
            .fields
            .iter()
            .map(|f| {
                let requirement = if let Some(rel) = model.relation_for_foreign_key(f.name) {
                    CreateRequirement::ForeignKey {
                        relation: rel.name,
                        required: !f.nullable,
                    }
                } else if f.updated_at {
                    CreateRequirement::Generated
                } else if f.default.is_some() {
                    CreateRequirement::Defaulted
                } else if f.nullable {
                    CreateRequirement::Optional
                } else {
                    CreateRequirement::Required
                };
                CreateFieldShape {
                    field: f.name,
                    field_type: f.field_type,
                    requirement,
                }
            })
            .collect();

        let update_fields = model
            .fields
            .iter()
            .map(|f| UpdateFieldShape {
                field: f.name,
                field_type: f.field_type,
                nullable: f.nullable,
                numeric_operations: f.field_type.is_numeric(),
                immutable: f.is_id,
            })
            .collect();

        let relation_writes = model
            .relations
            .iter()
            .map(|r| {
                use RelationWriteKind::*;
                let (on_create, on_update) = match r.kind {
                    RelationKind::ManyToOne | RelationKind::OneToOneOwner => {
                        let optional = model.field(r.local_field).is_some_and(|f| f.nullable);
                        let update = if optional {
                            vec![Connect, Create, Disconnect]
                        } else {
                            vec![Connect, Create]
                        };
                        (vec![Connect, Create], update)
                    }
                    RelationKind::OneToMany => (
                        vec![Create, CreateMany, Connect, ConnectMany],
                        vec![Create, CreateMany, Connect, ConnectMany],
                    ),
                    RelationKind::OneToOneInverse => {
                        (vec![Create, Connect], vec![Create, Connect, Disconnect])
                    }
                };
                RelationWriteShape {
                    relation: r.name,
                    target: r.target,
                    on_create,
                    on_update,
                }
            })
            .collect();

        Self {
            model: model.name,
            filters,
            relation_filters,
            unique_keys: model.unique_keys(),
            order_by,
            create_fields,
            update_fields,
            relation_writes,
        }
    }

    pub fn filter(&self, field: &str) -> Option<&ScalarFilterShape> {
        self.filters.iter().find(|f| f.field == field)
    }

    pub fn relation_filter(&self, relation: &str) -> Option<&RelationFilterShape> {
        self.relation_filters.iter().find(|r| r.relation == relation)
    }

    pub fn order(&self, field: &str) -> Option<&OrderShape> {
        self.order_by.iter().find(|o| o.field == field)
    }

    pub fn create_field(&self, field: &str) -> Option<&CreateFieldShape> {
        self.create_fields.iter().find(|f| f.field == field)
    }

    pub fn update_field(&self, field: &str) -> Option<&UpdateFieldShape> {
        self.update_fields.iter().find(|f| f.field == field)
    }

    pub fn relation_write(&self, relation: &str) -> Option<&RelationWriteShape> {
        self.relation_writes.iter().find(|r| r.relation == relation)
    }

    /// Whether `fields` contains at least one field with a uniqueness guarantee
    pub fn is_unique_selector(&self, fields: &[&str]) -> bool {
        fields.iter().any(|f| self.unique_keys.contains(f))
    }

    /// Fields the caller must supply on create (relation writes may stand in
    /// for required foreign keys)
    pub fn required_on_create(&self) -> impl Iterator<Item = &CreateFieldShape> {
        self.create_fields.iter().filter(|f| {
            matches!(
                f.requirement,
                CreateRequirement::Required | CreateRequirement::ForeignKey { required: true, .. }
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;

    fn shapes(name: &str) -> &'static InputShapes {
        SchemaRegistry::global().shapes(name).unwrap()
    }

    #[test]
    fn test_string_filter_operators() {
        let user = shapes("User");
        let email = user.filter("email").unwrap();
        assert!(email.supports(FilterOperator::Contains));
        assert!(email.supports(FilterOperator::Mode));
        assert!(!email.supports(FilterOperator::IsNull));

        let image = user.filter("image").unwrap();
        assert!(image.supports(FilterOperator::IsNull));
    }

    #[test]
    fn test_boolean_has_no_range_operators() {
        let user = shapes("User");
        let verified = user.filter("emailVerified").unwrap();
        assert_eq!(verified.operators, vec![FilterOperator::Equals, FilterOperator::Not]);
    }

    #[test]
    fn test_float_supports_numeric_updates() {
        let node = shapes("Node");
        assert!(node.update_field("positionX").unwrap().numeric_operations);
        assert!(!node.update_field("title").unwrap().numeric_operations);
        assert!(node.update_field("id").unwrap().immutable);
    }

    #[test]
    fn test_create_requirements() {
        let node = shapes("Node");
        assert_eq!(
            node.create_field("title").unwrap().requirement,
            CreateRequirement::Required
        );
        assert_eq!(
            node.create_field("description").unwrap().requirement,
            CreateRequirement::Optional
        );
        assert_eq!(
            node.create_field("id").unwrap().requirement,
            CreateRequirement::Defaulted
        );
        assert_eq!(
            node.create_field("roadMapId").unwrap().requirement,
            CreateRequirement::ForeignKey {
                relation: "roadMap",
                required: true
            }
        );
        assert_eq!(
            node.create_field("parentId").unwrap().requirement,
            CreateRequirement::ForeignKey {
                relation: "parent",
                required: false
            }
        );

        let user = shapes("User");
        assert_eq!(
            user.create_field("updatedAt").unwrap().requirement,
            CreateRequirement::Generated
        );
        let required: Vec<_> = user.required_on_create().map(|f| f.field).collect();
        assert_eq!(required, vec!["name", "email"]);
    }

    #[test]
    fn test_relation_filters_by_cardinality() {
        let node = shapes("Node");
        assert_eq!(
            node.relation_filter("children").unwrap().operators,
            vec![
                RelationFilterOperator::Some,
                RelationFilterOperator::Every,
                RelationFilterOperator::None
            ]
        );
        assert_eq!(
            node.relation_filter("parent").unwrap().operators,
            vec![RelationFilterOperator::Is, RelationFilterOperator::IsNot]
        );
    }

    #[test]
    fn test_disconnect_only_on_optional_relations() {
        let node = shapes("Node");
        assert!(node
            .relation_write("parent")
            .unwrap()
            .allows(RelationWriteKind::Disconnect, false));
        assert!(!node
            .relation_write("roadMap")
            .unwrap()
            .allows(RelationWriteKind::Disconnect, false));
        assert!(!node
            .relation_write("children")
            .unwrap()
            .allows(RelationWriteKind::Disconnect, true));
    }

    #[test]
    fn test_unique_selector() {
        let session = shapes("Session");
        assert!(session.is_unique_selector(&["token"]));
        assert!(session.is_unique_selector(&["userId", "id"]));
        assert!(!session.is_unique_selector(&["userId"]));
    }

    #[test]
    fn test_for_model_matches_cached_shapes() {
        let registry = SchemaRegistry::global();
        let derived = InputShapes::for_model(registry, "Project").unwrap();
        assert_eq!(&derived, registry.shapes("Project").unwrap());
    }
}
