diesel::table! {
    conversations (id) {
        id -> Integer,
        user_id -> BigInt,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    messages (id) {
        id -> Integer,
        conversation_id -> Integer,
        sequence_number -> BigInt,
        role -> Text,
        content -> Text,
        created_at -> Text,
        metadata -> Nullable<Text>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(conversations, messages);
