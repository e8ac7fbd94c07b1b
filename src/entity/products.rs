use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub badge: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub hero_image: Option<String>,
    pub images: Vec<String>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub catalog_node_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_items::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(
        belongs_to = "super::catalog_nodes::Entity",
        from = "Column::CatalogNodeId",
        to = "super::catalog_nodes::Column::Id"
    )]
    CatalogNodes,
}

impl Related<super::cart_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::catalog_nodes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CatalogNodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
