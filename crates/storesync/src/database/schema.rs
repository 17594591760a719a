/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Diesel schema for the two queue tables.
//!
//! The column shapes here are the de facto schema contract: the admin UI and
//! any reimplementation read these tables directly.

diesel::table! {
    tasks (id) {
        id -> BigInt,
        name -> Text,
        title -> Text,
        task_type -> Text,
        type_group -> Text,
        storekeeper_id -> BigInt,
        status -> Text,
        times_ran -> Integer,
        meta_data -> Text,
        execution_duration_ms -> Nullable<BigInt>,
        date_created -> Timestamp,
        date_updated -> Timestamp,
    }
}

diesel::table! {
    webhook_logs (id) {
        id -> BigInt,
        route -> Text,
        method -> Text,
        action -> Text,
        body -> Text,
        headers -> Nullable<Text>,
        response_code -> Integer,
        date_created -> Timestamp,
        date_updated -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(tasks, webhook_logs);
