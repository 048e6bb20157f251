//! Diesel schema for the catalog (§3). One `table!` per entity in the data
//! model, plus `blobs` (the value log's index, §4.1).

diesel::table! {
    steps (id) {
        id -> BigInt,
        name -> Text,
        script -> Text,
        parallel -> Nullable<Integer>,
        inputs -> Text,
        version -> BigInt,
        created_at -> Text,
    }
}

diesel::table! {
    columns (id) {
        id -> BigInt,
        name -> Text,
        resource_name -> Text,
        script -> Text,
        parallel -> Nullable<Integer>,
        dependencies -> Text,
        version -> BigInt,
        created_at -> Text,
    }
}

diesel::table! {
    resources (id) {
        id -> BigInt,
        name -> Text,
        object_hash -> Text,
        created_at -> Text,
        created_by_task_id -> Nullable<BigInt>,
    }
}

diesel::table! {
    tasks (id) {
        id -> BigInt,
        step_id -> BigInt,
        input_resource_id -> Nullable<BigInt>,
        processed -> Bool,
        error -> Nullable<Text>,
    }
}

diesel::table! {
    column_values (id) {
        id -> BigInt,
        column_id -> BigInt,
        resource_id -> BigInt,
        object_hash -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    column_tasks (id) {
        id -> BigInt,
        column_id -> BigInt,
        resource_id -> BigInt,
        processed -> Bool,
        error -> Nullable<Text>,
    }
}

diesel::table! {
    blobs (hash) {
        hash -> Text,
        offset -> BigInt,
        length -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(steps, columns, resources, tasks, column_values, column_tasks, blobs,);
