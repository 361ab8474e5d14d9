use prepquest::db::{Driver, TableMapper};

use crate::{
    entity::{Question, QuestionBank},
    mapper::{QuestionBankMapper, QuestionMapper},
};

pub type QuestionMapperImpl = TableMapper<Question>;
pub type QuestionBankMapperImpl = TableMapper<QuestionBank>;

impl<DB> QuestionMapper<DB> for TableMapper<Question>
where
    DB: Driver,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
    for<'q> DB::Arguments<'q>: sqlx::IntoArguments<'q, DB>,
    Question: for<'r> sqlx::FromRow<'r, DB::Row>,
{
}

impl<DB> QuestionBankMapper<DB> for TableMapper<QuestionBank>
where
    DB: Driver,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
    for<'q> DB::Arguments<'q>: sqlx::IntoArguments<'q, DB>,
    QuestionBank: for<'r> sqlx::FromRow<'r, DB::Row>,
{
}
