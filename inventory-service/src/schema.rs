diesel::table! {
    processed_commands (idempotency_key) {
        idempotency_key -> Varchar,
        command_id -> Uuid,
        result -> Nullable<Jsonb>,
        processed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    products (id) {
        id -> Uuid,
        name -> Varchar,
        total_stock -> Int4,
        is_published -> Bool,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    reservations (id) {
        id -> Uuid,
        product_id -> Uuid,
        order_id -> Uuid,
        order_number -> Varchar,
        customer_name -> Varchar,
        quantity -> Int4,
        start_date -> Timestamptz,
        end_date -> Timestamptz,
        status -> Varchar,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(reservations -> products (product_id));

diesel::allow_tables_to_appear_in_same_query!(
    processed_commands,
    products,
    reservations,
);
