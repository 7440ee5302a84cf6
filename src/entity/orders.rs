use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_code: String,
    pub user_id: Uuid,
    #[sea_orm(column_type = "JsonBinary")]
    pub delivery_address: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub invoice_address: Json,
    pub delivery_date: Option<DateTimeWithTimeZone>,
    pub delivery_time: Option<String>,
    pub payment_method: String,
    pub order_type: String,
    pub order_status: String,
    pub payment_status: String,
    pub sub_total: i64,
    pub delivery_charge: i64,
    pub taxes: i64,
    pub discount: i64,
    pub grand_total: i64,
    pub currency: String,
    pub payment_reference: Option<String>,
    pub rental_start_date: Option<DateTimeWithTimeZone>,
    pub rental_end_date: Option<DateTimeWithTimeZone>,
    pub return_date: Option<DateTimeWithTimeZone>,
    pub is_confirmed: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
