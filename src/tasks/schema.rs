diesel::table! {
    tasks (id) {
        id -> Integer,
        user_id -> BigInt,
        title -> Text,
        description -> Nullable<Text>,
        completed -> Bool,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}
