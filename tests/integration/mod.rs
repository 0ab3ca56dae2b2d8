mod flag_store_sqlx;
mod rest_client;
